//! Configuration for the volume loader.
//!
//! Settings are read, in order of precedence, from:
//! 1. environment variables (a `.env` file is loaded first by the binary)
//! 2. an optional TOML file passed with `--config`
//! 3. built-in defaults
//!
//! The engine endpoint itself is not configured here. bollard reads
//! `DOCKER_HOST` directly.

mod helpers;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::volumes::VolumeConfig;

pub(crate) use helpers::optional_env;
use helpers::{parse_bool_or, parse_or};

pub const ENV_STOP_GRACE_SECS: &str = "VOLUME_LOADER_STOP_GRACE_SECS";
pub const ENV_MOUNT_PATH: &str = "VOLUME_LOADER_MOUNT_PATH";
pub const ENV_SOURCE_PATH: &str = "VOLUME_LOADER_SOURCE_PATH";
pub const ENV_STRICT_RESOLVE: &str = "VOLUME_LOADER_STRICT_RESOLVE";
pub const ENV_KEEP_FAILED: &str = "VOLUME_LOADER_KEEP_FAILED";

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Seconds a container gets to shut down before it is killed.
    pub stop_grace_secs: u64,
    pub mount_path: String,
    pub source_path: String,
    pub strict_resolve: bool,
    pub keep_failed_loader: bool,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = VolumeConfig::default();
        Self {
            stop_grace_secs: defaults.stop_grace.as_secs(),
            mount_path: defaults.mount_path,
            source_path: defaults.source_path,
            strict_resolve: defaults.strict_resolve,
            keep_failed_loader: defaults.keep_failed_loader,
        }
    }
}

/// Shape of the optional TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub stop_grace_secs: Option<u64>,
    pub mount_path: Option<String>,
    pub source_path: Option<String>,
    pub strict_resolve: Option<bool>,
    pub keep_failed_loader: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl Config {
    /// Resolve from the process environment and an optional file.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_from(path, optional_env)
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn resolve_from<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let file = match path {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };
        let defaults = Self::default();

        let config = Self {
            stop_grace_secs: parse_or(
                ENV_STOP_GRACE_SECS,
                lookup(ENV_STOP_GRACE_SECS)?,
                file.stop_grace_secs.unwrap_or(defaults.stop_grace_secs),
            )?,
            mount_path: lookup(ENV_MOUNT_PATH)?
                .or(file.mount_path)
                .unwrap_or(defaults.mount_path),
            source_path: lookup(ENV_SOURCE_PATH)?
                .or(file.source_path)
                .unwrap_or(defaults.source_path),
            strict_resolve: parse_bool_or(
                ENV_STRICT_RESOLVE,
                lookup(ENV_STRICT_RESOLVE)?,
                file.strict_resolve.unwrap_or(defaults.strict_resolve),
            )?,
            keep_failed_loader: parse_bool_or(
                ENV_KEEP_FAILED,
                lookup(ENV_KEEP_FAILED)?,
                file.keep_failed_loader.unwrap_or(defaults.keep_failed_loader),
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_container_path(ENV_MOUNT_PATH, &self.mount_path)?;
        validate_container_path(ENV_SOURCE_PATH, &self.source_path)?;
        if self.mount_path.trim_end_matches('/') == self.source_path.trim_end_matches('/') {
            return Err(ConfigError::InvalidValue {
                key: ENV_SOURCE_PATH.to_string(),
                message: "must differ from the mount path".to_string(),
            });
        }
        Ok(())
    }

    /// Runtime settings for the orchestrators.
    pub fn volume_config(&self) -> VolumeConfig {
        VolumeConfig {
            stop_grace: Duration::from_secs(self.stop_grace_secs),
            mount_path: self.mount_path.clone(),
            source_path: self.source_path.clone(),
            strict_resolve: self.strict_resolve,
            keep_failed_loader: self.keep_failed_loader,
        }
    }
}

/// The loader runs `rm -rf` under the mount path, so it must be an absolute
/// path below `/` with no shell metacharacters.
fn validate_container_path(key: &str, path: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{message}: '{path}'"),
    };

    if !path.starts_with('/') {
        return Err(invalid("must be an absolute path"));
    }
    if path.trim_end_matches('/').is_empty() {
        return Err(invalid("must not be the root directory"));
    }
    if !path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
    {
        return Err(invalid("may only contain letters, digits, '/', '-', '_' and '.'"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid("must not contain '..'"));
    }
    Ok(())
}
