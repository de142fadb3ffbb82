//! Layering of global, project and environment configuration

use crate::global::GlobalConfig;
use crate::project::{validate_millis, OutputConfig, OutputFormat, ProjectConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the project configuration file
pub const PROJECT_FILE: &str = "trial.toml";

const ENV_TIMEOUT: &str = "TRIAL_TIMEOUT_MS";
const ENV_SLOW: &str = "TRIAL_SLOW_MS";
const ENV_FORMAT: &str = "TRIAL_FORMAT";
const ENV_COLOR: &str = "TRIAL_COLOR";

/// Builds a [`Config`] from the global file, a project file and `TRIAL_*`
/// variables, in increasing order of precedence
///
/// Command-line flags sit above all of these and are the caller's job.
pub struct ConfigLoader {
    /// Resolved on first use unless set explicitly
    global_config_path: Option<PathBuf>,
}

/// Everything a test binary was configured with
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `trial.toml` with environment overrides already applied
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    /// Directory holding the `trial.toml` that was used
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read global configuration from `path` instead of the home directory
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Use the nearest `trial.toml` in `start_dir` or one of its ancestors
    ///
    /// Having no project file at all is fine; the result then carries only
    /// global and environment settings.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let Some(root) = start_dir
            .ancestors()
            .find(|dir| dir.join(PROJECT_FILE).is_file())
        else {
            return self.layer(ProjectConfig::default(), None);
        };
        let project = ProjectConfig::load_from_file(&root.join(PROJECT_FILE))?;
        self.layer(project, Some(root.to_path_buf()))
    }

    /// Use exactly `config_path` as the project file; it must exist
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        let root = config_path.parent().map(Path::to_path_buf);
        self.layer(project, root)
    }

    fn layer(&mut self, project: ProjectConfig, root: Option<PathBuf>) -> ConfigResult<Config> {
        let global = match self.load_global_config() {
            Err(ConfigError::HomeNotFound) => GlobalConfig::default(),
            other => other?,
        };

        Ok(Config {
            project: apply_env_overrides(project)?,
            global,
            project_root: root,
        })
    }

    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match self.global_config_path.clone() {
            Some(path) => path,
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if path.is_file() {
            GlobalConfig::load_from_file(&path)
        } else {
            Ok(GlobalConfig::default())
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
    if let Ok(value) = env::var(ENV_TIMEOUT) {
        config.run_mut().timeout_ms = Some(parse_millis(ENV_TIMEOUT, &value)?);
    }
    if let Ok(value) = env::var(ENV_SLOW) {
        config.run_mut().slow_ms = Some(parse_millis(ENV_SLOW, &value)?);
    }
    if let Ok(value) = env::var(ENV_FORMAT) {
        value.parse::<OutputFormat>().map_err(|reason| ConfigError::invalid(ENV_FORMAT, reason))?;
        config.output_mut().format = Some(value);
    }
    if let Ok(value) = env::var(ENV_COLOR) {
        let enabled = matches!(value.to_lowercase().as_str(), "true" | "1" | "yes");
        config.output_mut().color = Some(enabled);
    }
    Ok(config)
}

fn parse_millis(var: &str, value: &str) -> ConfigResult<u64> {
    let millis = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(var, format!("expected milliseconds, got '{}'", value)))?;
    validate_millis(var, Some(millis))?;
    Ok(millis)
}

impl Config {
    /// Timeout for tests that do not set their own, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.project.timeout_ms().map(Duration::from_millis)
    }

    /// Slow threshold for tests that do not set their own, if configured
    pub fn slow(&self) -> Option<Duration> {
        self.project.slow_ms().map(Duration::from_millis)
    }

    pub fn filter(&self) -> Option<&str> {
        self.project.filter()
    }

    /// Reporter: project, then global, then TAP
    pub fn format(&self) -> OutputFormat {
        self.output_value(|o| o.format.as_deref().and_then(|f| f.parse().ok()))
            .unwrap_or_default()
    }

    pub fn verbose(&self) -> bool {
        self.output_value(|o| o.verbose).unwrap_or(false)
    }

    /// Colors stay on unless something turns them off
    pub fn color(&self) -> bool {
        self.output_value(|o| o.color).unwrap_or(true)
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Whether a `trial.toml` was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    fn output_value<T>(&self, get: impl Fn(&OutputConfig) -> Option<T>) -> Option<T> {
        self.project
            .output
            .as_ref()
            .and_then(&get)
            .or_else(|| self.global.output.as_ref().and_then(&get))
    }
}
