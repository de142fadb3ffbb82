//! Error types for test execution
//!
//! Two families: `TestError` is what a single test failed with and always
//! ends up inside a `TestResult`; `RunError` is a structural failure (a hook
//! threw) that is returned to the caller once the run has finished.

use crate::hook::HookKind;
use std::time::Duration;
use thiserror::Error;

/// Why a test ended with a `failure` verdict
#[derive(Error, Debug)]
pub enum TestError {
    /// The body returned an error
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The body panicked
    #[error("test panicked: {0}")]
    Panicked(String),

    /// The body did not settle before the timeout fired
    #[error("Timeout of {}ms exceeded.", .timeout.as_millis())]
    TimedOut { timeout: Duration, elapsed: Duration },
}

impl TestError {
    /// Check if this is a timeout failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, TestError::TimedOut { .. })
    }

    /// Short name of the failure kind, used by reporters
    pub fn kind(&self) -> &'static str {
        match self {
            TestError::Failed(_) => "Error",
            TestError::Panicked(_) => "Panic",
            TestError::TimedOut { .. } => "TimeoutError",
        }
    }
}

/// Structural failure that fails a run
#[derive(Error, Debug)]
pub enum RunError {
    /// A suite hook callback failed
    #[error("{kind} hook failed in suite '{}': {source:#}", display_path(.suite))]
    Hook {
        kind: HookKind,
        /// Full title of the suite that owns the hook
        suite: Vec<String>,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    pub(crate) fn hook(kind: HookKind, suite: Vec<String>, source: anyhow::Error) -> Self {
        RunError::Hook {
            kind,
            suite,
            source,
        }
    }

    /// The kind of hook that failed
    pub fn hook_kind(&self) -> HookKind {
        match self {
            RunError::Hook { kind, .. } => *kind,
        }
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(" ")
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
