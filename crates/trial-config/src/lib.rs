//! Trial Configuration
//!
//! Settings for a Trial test binary come from up to four layers, each one
//! overriding the one before:
//!
//! 1. `~/.trial/config.toml`, output preferences shared by every project
//! 2. `trial.toml`, found by walking up from the working directory
//! 3. `TRIAL_TIMEOUT_MS`, `TRIAL_SLOW_MS`, `TRIAL_FORMAT` and `TRIAL_COLOR`
//! 4. command-line flags, applied by the harness on top of [`Config`]
//!
//! ```no_run
//! use std::path::Path;
//! use trial_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new("."))?;
//! if let Some(timeout) = config.timeout() {
//!     println!("tests time out after {:?}", timeout);
//! }
//! # Ok::<(), trial_config::ConfigError>(())
//! ```

pub mod global;
pub mod loader;
pub mod project;

pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader, PROJECT_FILE};
pub use project::{OutputConfig, OutputFormat, ProjectConfig, RunConfig};

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist
    #[error("no configuration at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{}: {error}", .file.display())]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    /// A value parsed but is out of range, or an environment override is malformed
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("cannot locate the home directory")]
    HomeNotFound,
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read `path` and deserialize it, mapping a missing file to `NotFound`
pub(crate) fn read_toml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::IoError(e),
    })?;
    toml::from_str(&content).map_err(|error| ConfigError::TomlParseError {
        file: path.to_path_buf(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid("output.format", "expected tap, summary or json");
        assert_eq!(
            err.to_string(),
            "Invalid value for 'output.format': expected tap, summary or json"
        );
    }

    #[test]
    fn test_not_found_names_path() {
        let err = ConfigError::NotFound(Path::new("/tmp/trial.toml").to_path_buf());
        assert_eq!(err.to_string(), "no configuration at /tmp/trial.toml");
    }
}
