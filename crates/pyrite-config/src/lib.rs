//! Pyrite Configuration System
//!
//! Provides configuration management for the Pyrite runtime:
//! - Runtime configuration (pyrite.toml)
//! - Environment variable overrides (PYRITE_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project config (./pyrite.toml, searched upward from the start directory)
//! 3. Environment variables (PYRITE_*)
//!
//! # Example
//!
//! ```no_run
//! use pyrite_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! assert!(config.runtime.arena.batch_size > 0);
//! ```

pub mod loader;
pub mod runtime;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid environment override {var}={value}: {reason}")]
    InvalidEnvOverride {
        var: String,
        value: String,
        reason: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
pub use runtime::{ArenaConfig, DispatchConfig, LoggingConfig, RuntimeConfig, TracebackConfig};
