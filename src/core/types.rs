//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ComponentId`] - Validated component identifier (`org/name`)
//! - [`VersionId`] - Validated version identifier (`component/version`)
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Identifiers double as
//! relative directory paths inside a repository, so anything that could
//! escape the repository root is rejected.
//!
//! # Examples
//!
//! ```
//! use ki_repo::core::types::{ComponentId, VersionId};
//!
//! let version = VersionId::new("my/component/23").unwrap();
//! assert_eq!(version.component().as_str(), "my/component");
//! assert_eq!(version.name(), "23");
//!
//! assert!(VersionId::new("single").is_err());
//! assert!(ComponentId::new("my/../escape").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid component id: {0}")]
    InvalidComponentId(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),
}

/// Validate the path segments shared by component and version ids.
fn validate_segments(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id cannot be empty".into());
    }
    if id.starts_with('/') || id.ends_with('/') {
        return Err(format!("'{id}' cannot start or end with '/'"));
    }
    for segment in id.split('/') {
        if segment.is_empty() {
            return Err(format!("'{id}' contains an empty path segment"));
        }
        if segment == "." || segment == ".." {
            return Err(format!("'{id}' contains a relative path segment"));
        }
        if segment.chars().any(|c| c.is_control() || c == '\\') {
            return Err(format!("'{id}' contains an invalid character"));
        }
    }
    Ok(())
}

/// A validated component identifier such as `my/component`.
///
/// Components may be nested arbitrarily deep (`my/component/in/sub/dir`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a new validated component id.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_segments(&id).map_err(TypeError::InvalidComponentId)?;
        Ok(Self(id))
    }

    /// Get the component id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the id of one of this component's versions.
    pub fn version(&self, name: &str) -> Result<VersionId, TypeError> {
        VersionId::new(format!("{}/{}", self.0, name))
    }
}

impl TryFrom<String> for ComponentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated version identifier: a component id plus a trailing version
/// name, e.g. `my/component/23`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Create a new validated version id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersionId` if the id has fewer than two
    /// segments or contains segments that could escape a directory root.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_segments(&id).map_err(TypeError::InvalidVersionId)?;
        if !id.contains('/') {
            return Err(TypeError::InvalidVersionId(format!(
                "'{id}' must have the form component/version"
            )));
        }
        Ok(Self(id))
    }

    /// Get the version id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The component part of the id (everything before the last `/`).
    pub fn component(&self) -> ComponentId {
        let (component, _) = self.split();
        ComponentId(component.to_string())
    }

    /// The version name (the last path segment).
    pub fn name(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // Validated at construction: always contains a '/'.
        match self.0.rsplit_once('/') {
            Some(parts) => parts,
            None => ("", &self.0),
        }
    }
}

impl TryFrom<String> for VersionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A UTC timestamp, serialized as RFC3339.
///
/// # Example
///
/// ```
/// use ki_repo::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Imported at: {}", now);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
