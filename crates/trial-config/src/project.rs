//! Project Configuration (trial.toml)
//!
//! Handles project-level configuration stored in `trial.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Project configuration from trial.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Execution settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,

    /// Reporter settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Timeout for tests that do not set their own, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Slow threshold for tests that do not set their own, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_ms: Option<u64>,

    /// Only run tests whose full title contains this pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Reporter settings, shared by project and global configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Reporter ("tap", "summary", "json")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Print one line per test instead of dots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    /// Colorize output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

impl OutputConfig {
    /// Validate the output section; `section` prefixes field names in errors
    pub fn validate(&self, section: &str) -> ConfigResult<()> {
        if let Some(format) = &self.format {
            format.parse::<OutputFormat>().map_err(|_| {
                ConfigError::invalid(
                    format!("{}.format", section),
                    format!("must be 'tap', 'summary', or 'json', got '{}'", format),
                )
            })?;
        }
        Ok(())
    }

    /// Merge another output config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &OutputConfig) {
        if other.format.is_some() {
            self.format = other.format.clone();
        }
        if other.verbose.is_some() {
            self.verbose = other.verbose;
        }
        if other.color.is_some() {
            self.color = other.color;
        }
    }
}

/// Reporter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Test Anything Protocol, version 13
    #[default]
    Tap,
    /// Human-readable progress and summary
    Summary,
    /// One JSON document written when the run is done
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Tap => "tap",
            OutputFormat::Summary => "summary",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tap" => Ok(OutputFormat::Tap),
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(run) = &self.run {
            validate_millis("run.timeout_ms", run.timeout_ms)?;
            validate_millis("run.slow_ms", run.slow_ms)?;
        }

        if let Some(output) = &self.output {
            output.validate("output")?;
        }

        Ok(())
    }

    /// Get the configured timeout in milliseconds, if present
    pub fn timeout_ms(&self) -> Option<u64> {
        self.run.as_ref().and_then(|r| r.timeout_ms)
    }

    /// Get the configured slow threshold in milliseconds, if present
    pub fn slow_ms(&self) -> Option<u64> {
        self.run.as_ref().and_then(|r| r.slow_ms)
    }

    /// Get the title filter, if present
    pub fn filter(&self) -> Option<&str> {
        self.run.as_ref().and_then(|r| r.filter.as_deref())
    }

    /// Mutable access to the run section, creating it if missing
    pub fn run_mut(&mut self) -> &mut RunConfig {
        self.run.get_or_insert_with(RunConfig::default)
    }

    /// Mutable access to the output section, creating it if missing
    pub fn output_mut(&mut self) -> &mut OutputConfig {
        self.output.get_or_insert_with(OutputConfig::default)
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.run.is_some() {
            self.run = other.run.clone();
        }
        if let Some(output) = &other.output {
            self.output_mut().merge(output);
        }
    }
}

/// Durations must be strictly positive
pub(crate) fn validate_millis(field: &str, value: Option<u64>) -> ConfigResult<()> {
    if value == Some(0) {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}
