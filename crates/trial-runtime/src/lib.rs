//! Trial Runtime - suites, hooks and sequential async test execution
//!
//! This library provides the execution core of Trial:
//! - `Test`: a titled async body raced against its timeout
//! - `Hook`: ordered async callbacks chaining a value
//! - `Suite`: nested groups of tests sharing lifecycle hooks
//! - `TestRunner`: strictly sequential execution over tests and suites
//! - `Report`: results bucketed by verdict plus observer signals
//!
//! Everything runs on a single thread. Handles are `Rc`-based and futures
//! are `!Send`; use [`block_on`] (or a current-thread tokio runtime) to
//! drive a run.
//!
//! # Example
//!
//! ```no_run
//! use trial_runtime::{block_on, run, Runnable, Suite, Test};
//!
//! let suite = Suite::new("math");
//! Test::new_in(&suite, "adds", |_| async { anyhow::ensure!(1 + 1 == 2); Ok(()) });
//!
//! let results = block_on(run(&[Runnable::Suite(suite)], None)).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

/// Trial runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod hook;
pub mod log;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod suite;
pub mod test;

pub use error::{RunError, TestError};
pub use hook::{Hook, HookKind};
pub use log::{LogCapture, LogEntry, LogSink};
pub use report::{Event, ListenerId, Report, Signal};
pub use runner::{run, Runnable, TestRunner};
pub use runtime::block_on;
pub use suite::{HookedTest, Suite, SuiteItem};
pub use test::{Test, TestContext, TestResult, Verdict, DEFAULT_SLOW, DEFAULT_TIMEOUT};
