//! Configuration Loader
//!
//! Handles loading configuration from pyrite.toml and applying environment overrides.

use crate::runtime::RuntimeConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "pyrite.toml";

/// Configuration loader
///
/// Loads configuration with the following precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Project config (pyrite.toml) - overrides defaults
/// 3. Environment variables (PYRITE_*) - overrides project
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip environment overrides (used by embedders that manage their own env)
    ignore_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime configuration
    pub runtime: RuntimeConfig,

    /// Directory where pyrite.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { ignore_env: false }
    }

    /// Disable PYRITE_* environment overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find pyrite.toml. Missing config is not an
    /// error; defaults are used instead.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, runtime) = self.find_runtime_config(start_dir)?;
        let runtime = self.apply_env_overrides(runtime)?;

        Ok(Config {
            runtime,
            project_root,
        })
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let runtime = RuntimeConfig::load_from_file(config_path)?;
        let runtime = self.apply_env_overrides(runtime)?;

        Ok(Config {
            runtime,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    fn find_runtime_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, RuntimeConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = RuntimeConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, RuntimeConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized variables:
    /// - PYRITE_ARENA_BATCH_SIZE
    /// - PYRITE_MAX_DEPTH
    /// - PYRITE_TRACEBACK_LIMIT
    /// - PYRITE_FAST_PATHS (true/1/yes)
    /// - PYRITE_LOG
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> ConfigResult<RuntimeConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Some(size) = read_usize("PYRITE_ARENA_BATCH_SIZE")? {
            config.arena.batch_size = size;
        }

        if let Some(depth) = read_usize("PYRITE_MAX_DEPTH")? {
            config.arena.max_depth = depth;
        }

        if let Some(limit) = read_usize("PYRITE_TRACEBACK_LIMIT")? {
            config.traceback.limit = limit;
        }

        if let Ok(fast) = env::var("PYRITE_FAST_PATHS") {
            config.dispatch.fast_paths =
                matches!(fast.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Ok(filter) = env::var("PYRITE_LOG") {
            config.logging.filter = filter;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a pyrite.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

fn read_usize(var: &str) -> ConfigResult<Option<usize>> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvOverride {
                var: var.to_string(),
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
