//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Ki has two configuration scopes:
//! - **Global**: User-level settings (which home to use, lock timeout)
//! - **Home**: Settings stored with a ki home (target repositories, hashes)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. `$KI_HOME` (home directory only)
//! 4. Home config file
//! 5. CLI flags (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Home: {}", config.home().display());
//! println!("Imports go to: {}", config.import_repository());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, HomeConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::hash::DEFAULT_HASHES;
use crate::core::store::DEFAULT_LOCK_TIMEOUT;

/// Name of the home-scoped config file.
pub const HOME_CONFIG_FILE: &str = "ki-config.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
#[derive(Debug, Clone)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Home configuration (if the home has one)
    pub home_config: HomeConfig,
    /// The resolved ki home directory
    home: PathBuf,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// `home_override` (the `--home` flag) wins over every other source of
    /// the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// contain invalid values. Missing config files are not an error.
    pub fn load(home_override: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = Self::load_global()?;
        global.validate()?;

        let home = match home_override {
            Some(path) => path.to_path_buf(),
            None => Self::default_home(&global)?,
        };
        Self::with_global(global, global_path, home)
    }

    /// Load with an explicit global config file instead of the search path.
    pub fn load_from(global_path: &Path, home_override: Option<&Path>) -> Result<Self, ConfigError> {
        let global = Self::read_toml::<GlobalConfig>(global_path)?;
        global.validate()?;
        let home = match home_override {
            Some(path) => path.to_path_buf(),
            None => Self::default_home(&global)?,
        };
        Self::with_global(global, Some(global_path.to_path_buf()), home)
    }

    /// Configuration for a home directory, ignoring any global config.
    pub fn for_home(home: &Path) -> Result<Self, ConfigError> {
        Self::with_global(GlobalConfig::default(), None, home.to_path_buf())
    }

    fn with_global(
        global: GlobalConfig,
        global_path: Option<PathBuf>,
        home: PathBuf,
    ) -> Result<Self, ConfigError> {
        let home_config_path = home.join(HOME_CONFIG_FILE);
        let home_config = if home_config_path.exists() {
            Self::read_toml::<HomeConfig>(&home_config_path)?
        } else {
            HomeConfig::default()
        };
        home_config.validate()?;

        Ok(Config {
            global,
            home_config,
            home,
            global_path,
        })
    }

    fn default_home(global: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("KI_HOME") {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        if let Some(home) = &global.home {
            return Ok(home.clone());
        }
        let user_home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(user_home.join(".ki").join("home"))
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        // 1. Check $KI_CONFIG
        if let Ok(path) = std::env::var("KI_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 2. Check $XDG_CONFIG_HOME/ki/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("ki/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 3. Check ~/.ki/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".ki/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// The ki home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Repository that receives imports. Defaults to `local`.
    pub fn import_repository(&self) -> &str {
        self.home_config
            .import_repository
            .as_deref()
            .unwrap_or("local")
    }

    /// Repository that receives statuses. Defaults to `local`.
    pub fn status_repository(&self) -> &str {
        self.home_config
            .status_repository
            .as_deref()
            .unwrap_or("local")
    }

    /// Hashes version-build computes by default. Defaults to `sha1`.
    pub fn default_hashes(&self) -> Vec<String> {
        match &self.home_config.default_hashes {
            Some(hashes) => hashes.clone(),
            None => DEFAULT_HASHES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Timeout for document edit locks.
    pub fn lock_timeout(&self) -> Duration {
        self.global
            .lock_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}
