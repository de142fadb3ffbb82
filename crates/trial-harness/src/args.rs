//! Command-line flags of a test binary

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use trial_config::{Config, OutputFormat};

/// Run the tests in this binary.
///
/// Flags override trial.toml, which overrides ~/.trial/config.toml.
///
/// ENVIRONMENT VARIABLES:
///     TRIAL_TIMEOUT_MS  Default test timeout in milliseconds
///     TRIAL_SLOW_MS     Default slow threshold in milliseconds
///     TRIAL_FORMAT      Reporter (tap, summary, json)
///     TRIAL_COLOR       Set to '0' to disable colored output
///     TRIAL_LOG         Log filter for diagnostics on stderr
///     NO_COLOR          Set to disable colored output
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "trial")]
#[command(version)]
pub struct HarnessArgs {
    /// Only run tests whose full title contains this pattern
    #[arg(value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Reporter (tap, summary, json)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Timeout for tests that do not set their own
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Slow threshold for tests that do not set their own
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub slow: Option<u64>,

    /// Same as PATTERN
    #[arg(long, value_name = "PATTERN", conflicts_with = "pattern")]
    pub filter: Option<String>,

    /// Verbose output (one line per test, debug diagnostics)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Read project configuration from this file instead of searching for trial.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

/// Effective settings after merging configuration and flags
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub format: OutputFormat,
    pub timeout: Option<Duration>,
    pub slow: Option<Duration>,
    pub filter: Option<String>,
    pub verbose: bool,
    pub color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            timeout: None,
            slow: None,
            filter: None,
            verbose: false,
            color: true,
        }
    }
}

impl Settings {
    /// Flags take precedence over configuration
    pub fn resolve(config: &Config, args: &HarnessArgs) -> Self {
        Self {
            format: args.format.unwrap_or_else(|| config.format()),
            timeout: args.timeout.map(Duration::from_millis).or(config.timeout()),
            slow: args.slow.map(Duration::from_millis).or(config.slow()),
            filter: args
                .pattern
                .clone()
                .or_else(|| args.filter.clone())
                .or_else(|| config.filter().map(str::to_string)),
            verbose: args.verbose || config.verbose(),
            color: !args.no_color && config.color(),
        }
    }
}
