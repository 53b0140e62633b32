//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$KI_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/ki/config.toml`
//! 3. `~/.ki/config.toml`
//!
//! # Home Config
//!
//! Located at `<home>/ki-config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing: hash ids must be registered
//! and repository names must be plain directory names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::hash::HashRegistry;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// home = "/srv/ki"
/// lock_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default ki home directory
    pub home: Option<PathBuf>,

    /// How long document edits wait for their lock
    pub lock_timeout_ms: Option<u64>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "lock_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration stored inside a ki home.
///
/// # Example
///
/// ```toml
/// import_repository = "local"
/// status_repository = "site"
/// default_hashes = ["sha1", "sha2"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HomeConfig {
    /// Repository that receives imported versions
    pub import_repository: Option<String>,

    /// Repository that receives new statuses and orderings
    pub status_repository: Option<String>,

    /// Hashes computed by version-build when none are given
    pub default_hashes: Option<Vec<String>>,
}

impl HomeConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in [&self.import_repository, &self.status_repository]
            .into_iter()
            .flatten()
        {
            validate_repository_name(name)?;
        }

        if let Some(hashes) = &self.default_hashes {
            let registry = HashRegistry::with_defaults();
            for id in hashes {
                if !registry.contains(id) {
                    return Err(ConfigError::InvalidValue(format!(
                        "unknown hash '{}', must be one of: {}",
                        id,
                        registry.ids().join(", ")
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Repository names are single directory names.
pub fn validate_repository_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return Err(ConfigError::InvalidValue(format!(
            "invalid repository name '{name}'"
        )));
    }
    Ok(())
}
