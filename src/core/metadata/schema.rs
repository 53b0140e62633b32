//! core::metadata::schema
//!
//! Version metadata document (`ki-version.json`) and status entries.
//!
//! # Document Shape
//!
//! ```json
//! {
//!   "version_id": "my/component/23",
//!   "source": {"url": "...", "tag-url": "...", "author": "...", "repotype": "git"},
//!   "files": [{"path": "dir/test.txt", "size": 2, "tags": ["bar"], "sha1": "e0c9..."}],
//!   "operations": [["cp", "foo.txt", "foo2.txt"]],
//!   "dependencies": [{"version_id": "my/tests/a/123", "name": "tests", "path": "test",
//!                     "internal": true, "operations": [["rm", "*.info"]]}]
//! }
//! ```
//!
//! Empty sections are omitted when writing. File entries keep any extra
//! attributes (digests keyed by algorithm id, custom flags) in
//! [`FileEntry::attributes`].
//!
//! # Invariants
//!
//! - No two file entries share a `path` unless they are identical
//!
//! # Example
//!
//! ```
//! use ki_repo::core::metadata::schema::{DependencyEdge, VersionMetadata};
//!
//! let mut meta = VersionMetadata::default();
//! let dep = meta.add_dependency(DependencyEdge::parse("my/tests/a/123,name=tests,path=test,internal").unwrap());
//! dep.add_operation(["rm", "*.info"]);
//!
//! let json = serde_json::to_value(&meta).unwrap();
//! assert_eq!(json["dependencies"][0]["internal"], true);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::types::{TypeError, VersionId};

/// File name of the metadata document inside a version directory.
pub const METADATA_FILE: &str = "ki-version.json";

/// File name of the status log inside a version directory.
pub const STATUSES_FILE: &str = "ki-statuses.json";

/// File name of the reverse dependency list inside a version directory.
pub const REVERSE_DEPENDENCIES_FILE: &str = "ki-reverse-dependencies.json";

/// Errors from metadata construction.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("file '{0}' is already listed with different attributes")]
    DuplicateFile(String),

    #[error("invalid dependency '{text}': {message}")]
    InvalidDependency { text: String, message: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("'version_id' has not been set")]
    MissingVersionId,

    #[error("type validation failed: {0}")]
    TypeError(#[from] TypeError),
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Provenance of a version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(
        default,
        rename = "tag-url",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repotype: Option<String>,

    /// Any other provenance fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Source {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.tag_url.is_none()
            && self.author.is_none()
            && self.repotype.is_none()
            && self.extra.is_empty()
    }

    /// Set a field by its document key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match key {
            "url" => self.url = Some(value),
            "tag-url" => self.tag_url = Some(value),
            "author" => self.author = Some(value),
            "repotype" => self.repotype = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Fields as sorted `(key, value)` pairs.
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = [
            ("url", &self.url),
            ("tag-url", &self.tag_url),
            ("author", &self.author),
            ("repotype", &self.repotype),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), v)))
        .collect();
        fields.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields.sort();
        fields
    }
}

/// One file of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the version's binaries root.
    pub path: String,

    /// Size in bytes.
    pub size: u64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Digests keyed by algorithm id, plus any other attributes.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            executable: false,
            tags: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Record a digest.
    pub fn with_hash(mut self, id: impl Into<String>, hex: impl Into<String>) -> Self {
        self.attributes.insert(id.into(), Value::String(hex.into()));
        self
    }

    /// The recorded digest for an algorithm id, if any.
    pub fn hash(&self, id: &str) -> Option<&str> {
        self.attributes.get(id).and_then(Value::as_str)
    }

    /// Whether any of the file's tags is in `tags`.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

/// One rewrite operation in document form: `["cp", "*.txt", "docs/"]`.
///
/// Validation happens when the operation is compiled, see
/// [`crate::core::ops`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub Vec<String>);

impl Operation {
    /// Split a command-line form such as `"cp foo.txt foo2.txt"`.
    pub fn parse(s: &str) -> Result<Self, MetadataError> {
        let parts: Vec<String> = s.split_whitespace().map(String::from).collect();
        if parts.is_empty() {
            return Err(MetadataError::InvalidOperation(
                "operation cannot be empty".into(),
            ));
        }
        Ok(Self(parts))
    }

    /// The operation name (`cp`, `mv`, `rm`, `dep-rm`).
    pub fn name(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// Everything after the name.
    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Operation {
    fn from(parts: [S; N]) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// A directed reference from one version to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub version_id: VersionId,

    /// Logical name, used for `->name` navigation and dependency paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sub-directory prefix for the files this dependency contributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Internal dependencies are only followed from the traversal root.
    #[serde(default, skip_serializing_if = "is_false")]
    pub internal: bool,

    /// Operations applied to the files this dependency contributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

impl DependencyEdge {
    pub fn new(version_id: VersionId) -> Self {
        Self {
            version_id,
            name: None,
            path: None,
            internal: false,
            operations: Vec::new(),
        }
    }

    /// Parse `id[,name=N][,path=P][,internal]`.
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let invalid = |message: String| MetadataError::InvalidDependency {
            text: text.to_string(),
            message,
        };

        let mut parts = text.split(',');
        let id = parts.next().unwrap_or("");
        let mut edge = Self::new(VersionId::new(id).map_err(|e| invalid(e.to_string()))?);

        for part in parts {
            match part.split_once('=') {
                Some(("name", v)) => edge.name = Some(v.to_string()),
                Some(("path", v)) => edge.path = Some(v.to_string()),
                Some(("internal", v)) => edge.internal = v != "false",
                None if part == "internal" => edge.internal = true,
                _ => return Err(invalid(format!("unknown parameter '{part}'"))),
            }
        }
        Ok(edge)
    }

    pub fn add_operation(&mut self, op: impl Into<Operation>) {
        self.operations.push(op.into());
    }

    /// Patterns of every `dep-rm` operation on this edge.
    pub fn dep_rm_patterns(&self) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .filter(|op| op.name() == "dep-rm")
            .flat_map(|op| op.args().iter().map(String::as_str))
    }
}

/// The metadata document of one version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<VersionId>,

    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyEdge>,
}

impl VersionMetadata {
    pub fn new(version_id: VersionId) -> Self {
        Self {
            version_id: Some(version_id),
            ..Self::default()
        }
    }

    /// The version id, or an error if the document does not carry one.
    pub fn require_version_id(&self) -> Result<&VersionId, MetadataError> {
        self.version_id
            .as_ref()
            .ok_or(MetadataError::MissingVersionId)
    }

    /// Add a file entry.
    ///
    /// Adding an identical entry twice is a no-op; adding a different entry
    /// for an already listed path is an error.
    pub fn add_file(&mut self, entry: FileEntry) -> Result<(), MetadataError> {
        match self.files.iter().find(|f| f.path == entry.path) {
            Some(existing) if *existing == entry => Ok(()),
            Some(_) => Err(MetadataError::DuplicateFile(entry.path)),
            None => {
                self.files.push(entry);
                Ok(())
            }
        }
    }

    /// Append a dependency and return it for further editing.
    pub fn add_dependency(&mut self, edge: DependencyEdge) -> &mut DependencyEdge {
        self.dependencies.push(edge);
        let last = self.dependencies.len() - 1;
        &mut self.dependencies[last]
    }

    pub fn add_operation(&mut self, op: impl Into<Operation>) {
        self.operations.push(op.into());
    }

    /// Find a dependency by its logical name.
    pub fn dependency_by_name(&self, name: &str) -> Option<&DependencyEdge> {
        self.dependencies
            .iter()
            .find(|d| d.name.as_deref() == Some(name))
    }
}

/// One entry of a version's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub key: String,
    pub value: String,

    /// Extra flags recorded with the status (e.g. `action`).
    #[serde(flatten)]
    pub flags: BTreeMap<String, String>,
}

impl StatusEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags: BTreeMap::new(),
        }
    }

    /// Parse `key=value`.
    pub fn parse(key_value: &str) -> Option<Self> {
        key_value
            .split_once('=')
            .map(|(k, v)| Self::new(k, v))
    }
}

/// Per-component ordering of status values: `{"maturity": ["alpha", "beta"]}`.
pub type StatusInfo = BTreeMap<String, Vec<String>>;
