//! User-level defaults (`~/.trial/config.toml`)
//!
//! Only the `[output]` section is accepted here; run limits belong to a
//! project.

use crate::project::OutputConfig;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reporter preferences shared by every project of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Reporter defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

impl GlobalConfig {
    /// Read and validate a global config file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(output) = &self.output {
            output.validate("output")?;
        }
        Ok(())
    }

    /// `~/.trial/config.toml`
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".trial").join("config.toml"))
    }

    /// Overlay `other` on this config, field by field
    pub fn merge(&mut self, other: &GlobalConfig) {
        if let Some(output) = &other.output {
            self.output
                .get_or_insert_with(OutputConfig::default)
                .merge(output);
        }
    }
}
