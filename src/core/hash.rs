//! core::hash
//!
//! Registry of named digest algorithms.
//!
//! # Architecture
//!
//! File entries in version metadata record digests keyed by algorithm id
//! (`"sha1": "e0c9..."`). The [`HashRegistry`] maps those ids to
//! [`HashAlgorithm`] implementations. Consumers only see the trait; the
//! concrete RustCrypto types are registered once in
//! [`HashRegistry::with_defaults`].
//!
//! # Example
//!
//! ```
//! use ki_repo::core::hash::HashRegistry;
//!
//! let registry = HashRegistry::with_defaults();
//! let mut digester = registry.get("sha1").unwrap().digester();
//! digester.update(b"aa");
//! assert_eq!(digester.finalize_hex(), "e0c9035898dd52fc65c41454cec9c4d2611bfb37");
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::Digest;

use super::errors::{RepoError, Result};

/// Algorithm ids recorded by default when building metadata.
pub const DEFAULT_HASHES: &[&str] = &["sha1"];

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// An in-progress digest computation.
pub trait Digester {
    /// Feed more data.
    fn update(&mut self, data: &[u8]);

    /// Finish and return the lowercase hex digest.
    fn finalize_hex(self: Box<Self>) -> String;
}

/// A named digest algorithm.
pub trait HashAlgorithm: Send + Sync {
    /// The id used as the key in file entries.
    fn id(&self) -> &str;

    /// Start a new digest computation.
    fn digester(&self) -> Box<dyn Digester>;
}

struct RustCryptoDigester<D>(D);

impl<D: Digest> Digester for RustCryptoDigester<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        hex::encode(self.0.finalize())
    }
}

/// Adapter registering any RustCrypto [`Digest`] under an id.
struct RustCryptoAlgorithm<D> {
    id: &'static str,
    _digest: std::marker::PhantomData<fn() -> D>,
}

impl<D> RustCryptoAlgorithm<D> {
    fn new(id: &'static str) -> Self {
        Self {
            id,
            _digest: std::marker::PhantomData,
        }
    }
}

impl<D: Digest + 'static> HashAlgorithm for RustCryptoAlgorithm<D> {
    fn id(&self) -> &str {
        self.id
    }

    fn digester(&self) -> Box<dyn Digester> {
        Box::new(RustCryptoDigester(D::new()))
    }
}

/// String-keyed registry of hash algorithms.
#[derive(Default)]
pub struct HashRegistry {
    algorithms: BTreeMap<String, Box<dyn HashAlgorithm>>,
}

impl std::fmt::Debug for HashRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRegistry")
            .field("algorithms", &self.ids())
            .finish()
    }
}

impl HashRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `sha1`, `sha2` (SHA-256) and `md5`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RustCryptoAlgorithm::<sha1::Sha1>::new("sha1")));
        registry.register(Box::new(RustCryptoAlgorithm::<sha2::Sha256>::new("sha2")));
        registry.register(Box::new(RustCryptoAlgorithm::<md5::Md5>::new("md5")));
        registry
    }

    /// Register an algorithm, replacing any previous one with the same id.
    pub fn register(&mut self, algorithm: Box<dyn HashAlgorithm>) {
        self.algorithms
            .insert(algorithm.id().to_string(), algorithm);
    }

    /// Look up an algorithm by id.
    pub fn get(&self, id: &str) -> Option<&dyn HashAlgorithm> {
        self.algorithms.get(id).map(|a| a.as_ref())
    }

    /// Look up an algorithm, failing with a configuration error.
    pub fn require(&self, id: &str) -> Result<&dyn HashAlgorithm> {
        self.get(id).ok_or_else(|| {
            RepoError::Configuration(format!(
                "unknown hash '{}', available: {}",
                id,
                self.ids().join(", ")
            ))
        })
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.algorithms.contains_key(id)
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.algorithms.keys().map(String::as_str).collect()
    }

    /// Compute every requested digest of a file in a single streamed pass.
    ///
    /// Returns a map from algorithm id to hex digest.
    pub fn calculate<S: AsRef<str>>(
        &self,
        path: &Path,
        ids: &[S],
    ) -> Result<BTreeMap<String, String>> {
        let mut digesters = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            digesters.push((id.to_string(), self.require(id)?.digester()));
        }

        let mut file = File::open(path).map_err(|e| RepoError::io(path, e))?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|e| RepoError::io(path, e))?;
            if n == 0 {
                break;
            }
            for (_, digester) in digesters.iter_mut() {
                digester.update(&buf[..n]);
            }
        }

        Ok(digesters
            .into_iter()
            .map(|(id, digester)| (id, digester.finalize_hex()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_registered() {
        let registry = HashRegistry::with_defaults();
        assert_eq!(registry.ids(), vec!["md5", "sha1", "sha2"]);
        assert!(registry.contains("sha1"));
        assert!(registry.get("crc32").is_none());
    }

    #[test]
    fn unknown_hash_is_configuration_error() {
        let registry = HashRegistry::with_defaults();
        let err = registry.require("crc32").err().expect("should fail");
        assert!(matches!(err, RepoError::Configuration(_)));
        assert!(err.to_string().contains("sha1"));
    }

    #[test]
    fn calculates_all_digests_in_one_pass() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("test.txt");
        std::fs::write(&path, "aa").expect("write");

        let registry = HashRegistry::with_defaults();
        let hashes = registry
            .calculate(&path, &["sha1", "md5", "sha2"])
            .expect("calculate");

        assert_eq!(hashes["sha1"], "e0c9035898dd52fc65c41454cec9c4d2611bfb37");
        assert_eq!(hashes["md5"], "4124bc0a9335c27f086f24ba207a4912");
        assert_eq!(
            hashes["sha2"],
            "961b6dd3ede3cb8ecbaacbd68de040cd78eb2ed5889130cceb4c49268ea4d506"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let temp = TempDir::new().expect("create temp dir");
        let registry = HashRegistry::with_defaults();
        let err = registry
            .calculate(&temp.path().join("nope"), &["sha1"])
            .expect_err("should fail");
        assert!(matches!(err, RepoError::Io { .. }));
    }
}
