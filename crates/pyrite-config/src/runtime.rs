//! Runtime Configuration (pyrite.toml)
//!
//! Every section is optional; a missing section or key falls back to the
//! defaults the runtime was tuned with.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frames allocated per arena growth step
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Deepest call chain allowed before a recursion error
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Maximum number of printed traceback lines
pub const DEFAULT_TRACEBACK_LIMIT: usize = 1000;

/// Runtime configuration from pyrite.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Frame arena configuration
    #[serde(default)]
    pub arena: ArenaConfig,

    /// Traceback bookkeeping
    #[serde(default)]
    pub traceback: TracebackConfig,

    /// Operator dispatch
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Frame arena configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ArenaConfig {
    /// Frames allocated each time the free list runs dry (default: 15)
    pub batch_size: usize,

    /// Maximum call depth (default: 1000)
    pub max_depth: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Traceback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct TracebackConfig {
    /// Record provenance while errors propagate
    pub enabled: bool,

    /// Maximum number of lines in a formatted traceback (default: 1000)
    pub limit: usize,
}

impl Default for TracebackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: DEFAULT_TRACEBACK_LIMIT,
        }
    }
}

/// Operator dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct DispatchConfig {
    /// Use inline fast paths for common operand types.
    ///
    /// Disabling routes every operator through the generic object protocol,
    /// which is mainly useful when comparing both paths.
    pub fast_paths: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { fast_paths: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// `tracing` filter directive (default: "warn")
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse runtime configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: "<string>".into(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the runtime configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.arena.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "arena.batch_size".to_string(),
                reason: "batch size must be at least 1".to_string(),
            });
        }

        if self.arena.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "arena.max_depth".to_string(),
                reason: "maximum depth must be at least 1".to_string(),
            });
        }

        if self.traceback.limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "traceback.limit".to_string(),
                reason: "limit must be at least 1".to_string(),
            });
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.filter".to_string(),
                reason: "filter cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
