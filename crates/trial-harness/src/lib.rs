//! Trial Harness - entry point for `harness = false` test binaries
//!
//! Declare tests with `trial-runtime`, then hand the top-level items to
//! [`main`]:
//!
//! ```no_run
//! use trial_runtime::{Runnable, Suite, Test};
//!
//! fn main() {
//!     let suite = Suite::new("parser");
//!     Test::new_in(&suite, "accepts empty input", |_| async { Ok(()) });
//!     trial_harness::main(&[Runnable::Suite(suite)]);
//! }
//! ```
//!
//! Exit codes: 0 when at least one test ran and none failed, 1 when a test
//! failed or nothing ran, 2 when a hook failed or configuration could not be
//! loaded. A failed hook still lets the rest of the run finish and report.

pub mod args;
pub mod logging;
pub mod reporter;

pub use args::{HarnessArgs, Settings};
pub use reporter::{JsonReporter, Output, Reporter, SharedBuffer, SummaryReporter, TapReporter};

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::Path;
use std::time::Duration;
use trial_config::{Config, ConfigLoader};
use trial_runtime::{block_on, Report, Runnable, Test, TestRunner};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// At least one test ran and none failed
    Passed,
    /// A test failed, or there were no tests
    Failed,
    /// A hook failed or configuration could not be loaded
    ///
    /// For a hook this is decided after the run, once reporters are done.
    Aborted,
}

impl Status {
    /// Process exit code
    pub fn code(self) -> i32 {
        match self {
            Status::Passed => 0,
            Status::Failed => 1,
            Status::Aborted => 2,
        }
    }
}

/// Parse flags from the command line, run `items` and exit the process
pub fn main(items: &[Runnable]) -> ! {
    let args = HarnessArgs::parse();
    let status = execute(items, &args);
    std::process::exit(status.code())
}

/// Load configuration, run `items` with the configured reporter on stdout
pub fn execute(items: &[Runnable], args: &HarnessArgs) -> Status {
    logging::init(args.verbose);

    let config = match load_config(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            return Status::Aborted;
        }
    };

    let settings = Settings::resolve(&config, args);
    run_with(items, &settings, Output::stdout())
}

fn load_config(args: &HarnessArgs) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    match &args.config {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            load_from(&mut loader, &cwd)
        }
    }
}

fn load_from(loader: &mut ConfigLoader, dir: &Path) -> Result<Config> {
    let config = loader
        .load_from_directory(dir)
        .context("failed to load configuration")?;
    if let Some(root) = config.project_root() {
        tracing::debug!(root = %root.display(), "loaded trial.toml");
    }
    Ok(config)
}

/// Run `items` with resolved settings, writing the report to `out`
///
/// Turning color off lasts only for this call.
pub fn run_with(items: &[Runnable], settings: &Settings, out: Output) -> Status {
    if !settings.color {
        colored::control::set_override(false);
    }

    let status = run_configured(items, settings, out);

    if !settings.color {
        colored::control::unset_override();
    }
    status
}

fn run_configured(items: &[Runnable], settings: &Settings, out: Output) -> Status {
    let tests = collect_tests(items);
    apply_limits(&tests, settings.timeout, settings.slow);
    if let Some(pattern) = &settings.filter {
        apply_filter(&tests, pattern);
    }

    let reporter = reporter::for_format(settings.format, settings.verbose, out);
    let runner = TestRunner::new().with_reporter(move |report: &Report| reporter.attach(report));

    match block_on(runner.run(items)) {
        Ok(results) => {
            let failed = results.iter().any(|r| r.is_failure());
            if failed || results.is_empty() {
                Status::Failed
            } else {
                Status::Passed
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "hook failed during run");
            eprintln!("{} {}", "aborted:".red().bold(), err);
            Status::Aborted
        }
    }
}

/// Every test reachable from `items`, in run order
pub fn collect_tests(items: &[Runnable]) -> Vec<Test> {
    items
        .iter()
        .flat_map(|item| match item {
            Runnable::Test(test) => vec![test.clone()],
            Runnable::Suite(suite) => suite.all_tests(),
        })
        .collect()
}

/// Give tests without their own timeout or slow threshold the configured ones
pub fn apply_limits(tests: &[Test], timeout: Option<Duration>, slow: Option<Duration>) {
    for test in tests {
        if let (Some(timeout), None) = (timeout, test.timeout_override()) {
            test.set_timeout(timeout);
        }
        if let (Some(slow), None) = (slow, test.slow_override()) {
            test.set_slow(slow);
        }
    }
}

/// Disable tests whose joined full title does not contain `pattern`
///
/// Disabled tests are still reported, as ignored.
pub fn apply_filter(tests: &[Test], pattern: &str) {
    let mut skipped = 0;
    for test in tests {
        if !test.full_title().join(" ").contains(pattern) {
            test.disable();
            skipped += 1;
        }
    }
    tracing::debug!(pattern, skipped, "applied title filter");
}
