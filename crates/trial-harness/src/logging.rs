//! Diagnostics for the harness itself
//!
//! Test output goes to stdout through the reporters; `tracing` diagnostics go
//! to stderr so they never corrupt a TAP or JSON stream.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TRIAL_LOG";

/// Install the stderr subscriber
///
/// `TRIAL_LOG` takes precedence; otherwise `debug` when verbose, `warn` if not.
/// Installing twice is a no-op.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if builder.try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}
