//! Test - a single titled unit of async work
//!
//! A `Test` is a handle: clones share identity and configuration, so a test
//! can be reconfigured after it has been registered in a suite.

use crate::error::{panic_message, TestError};
use chrono::{DateTime, Utc};
use crate::log::{LogCapture, LogEntry, LogSink};
use crate::runner::Runnable;
use crate::suite::{Suite, WeakSuite};
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

/// Timeout used when a test does not set its own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Slow threshold used when a test does not set its own
pub const DEFAULT_SLOW: Duration = Duration::from_millis(500);

type Body = Rc<dyn Fn(TestContext) -> LocalBoxFuture<'static, anyhow::Result<()>>>;
type Predicate = Rc<dyn Fn() -> bool>;

/// Outcome classification of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Failure,
    Ignored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Failure => "failure",
            Verdict::Ignored => "ignored",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a test body receives when it runs
#[derive(Debug, Clone)]
pub struct TestContext {
    test: Test,
    log: LogSink,
}

impl TestContext {
    /// Record a message on this run's result
    pub fn log(&self, message: impl Into<String>) {
        self.log.log(message);
    }

    /// A writer that can be moved into spawned work
    pub fn sink(&self) -> LogSink {
        self.log.clone()
    }

    /// The test being run
    pub fn test(&self) -> &Test {
        &self.test
    }
}

struct TestInner {
    title: String,
    body: Body,
    timeout: Cell<Option<Duration>>,
    slow: Cell<Option<Duration>>,
    enabled: RefCell<Predicate>,
    parent: Option<WeakSuite>,
}

/// A single test
#[derive(Clone)]
pub struct Test {
    inner: Rc<TestInner>,
}

impl Test {
    /// Create a free-standing test
    ///
    /// The body's success value is discarded; an `Err` or a panic fails the test.
    pub fn new<F, Fut, T>(title: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: 'static,
    {
        Self::build(None, title.into(), body)
    }

    /// Create a test and register it in `suite`
    pub fn new_in<F, Fut, T>(suite: &Suite, title: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: 'static,
    {
        let test = Self::build(Some(suite.downgrade()), title.into(), body);
        suite.add(Runnable::Test(test.clone()));
        test
    }

    fn build<F, Fut, T>(parent: Option<WeakSuite>, title: String, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: 'static,
    {
        let body: Body = Rc::new(move |cx| body(cx).map(|r| r.map(|_| ())).boxed_local());
        Self {
            inner: Rc::new(TestInner {
                title,
                body,
                timeout: Cell::new(None),
                slow: Cell::new(None),
                enabled: RefCell::new(Rc::new(|| true)),
                parent,
            }),
        }
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    /// The suite this test was declared in, if it is still alive
    pub fn parent(&self) -> Option<Suite> {
        self.inner.parent.as_ref().and_then(WeakSuite::upgrade)
    }

    /// Non-empty ancestor titles followed by this test's own title
    pub fn full_title(&self) -> Vec<String> {
        let mut title = self.parent().map(|p| p.full_title()).unwrap_or_default();
        if !self.inner.title.is_empty() {
            title.push(self.inner.title.clone());
        }
        title
    }

    /// Effective timeout
    pub fn timeout(&self) -> Duration {
        self.inner.timeout.get().unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Effective slow threshold
    pub fn slow(&self) -> Duration {
        self.inner.slow.get().unwrap_or(DEFAULT_SLOW)
    }

    /// Timeout set explicitly on this test
    pub fn timeout_override(&self) -> Option<Duration> {
        self.inner.timeout.get()
    }

    /// Slow threshold set explicitly on this test
    pub fn slow_override(&self) -> Option<Duration> {
        self.inner.slow.get()
    }

    pub fn set_timeout(&self, timeout: Duration) -> &Self {
        self.inner.timeout.set(Some(timeout));
        self
    }

    pub fn set_slow(&self, slow: Duration) -> &Self {
        self.inner.slow.set(Some(slow));
        self
    }

    /// Replace the predicate deciding whether the test runs at all
    pub fn set_enabled(&self, enabled: impl Fn() -> bool + 'static) -> &Self {
        *self.inner.enabled.borrow_mut() = Rc::new(enabled);
        self
    }

    pub fn enable(&self) -> &Self {
        self.set_enabled(|| true)
    }

    pub fn disable(&self) -> &Self {
        self.set_enabled(|| false)
    }

    /// Evaluate the enabled predicate
    pub fn is_enabled(&self) -> bool {
        let predicate = Rc::clone(&self.inner.enabled.borrow());
        predicate()
    }

    /// Run the test once
    ///
    /// Never fails: errors, panics and timeouts all end up in the result.
    /// The body races a timer; whichever finishes first decides the verdict
    /// and the other is dropped. Dropping the body stops it at its current
    /// suspension point, but anything it spawned onto the runtime keeps
    /// running without being observed.
    pub async fn run(&self) -> TestResult {
        if !self.is_enabled() {
            tracing::debug!(test = %self, "test disabled, skipping");
            return TestResult::ignored(self.clone());
        }

        let timeout = self.timeout();
        let capture = LogCapture::acquire();
        let cx = TestContext {
            test: self.clone(),
            log: capture.sink(),
        };
        let body = Rc::clone(&self.inner.body);

        let started_at = Utc::now();
        let started = Instant::now();
        let attempt = AssertUnwindSafe(async move { body(cx).await }).catch_unwind();
        let outcome = tokio::time::timeout(timeout, attempt).await;
        let finished = Instant::now();

        let exception = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(error))) => Some(TestError::Failed(error)),
            Ok(Err(payload)) => Some(TestError::Panicked(panic_message(&*payload))),
            Err(_) => Some(TestError::TimedOut {
                timeout,
                elapsed: finished - started,
            }),
        };

        TestResult::completed(
            self.clone(),
            started_at,
            (started, finished),
            self.slow(),
            exception,
            capture.release(),
        )
    }
}

impl PartialEq for Test {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Test {}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("title", &self.inner.title)
            .field("timeout", &self.inner.timeout.get())
            .field("slow", &self.inner.slow.get())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_title().join(" "))
    }
}

/// Result of running a test once
#[derive(Debug)]
pub struct TestResult {
    pub verdict: Verdict,
    pub started: Instant,
    pub finished: Instant,
    /// Wall-clock start, for reporters
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True if the run took at least the slow threshold
    pub slow: bool,
    pub test: Test,
    /// Present only for `Verdict::Failure`
    pub exception: Option<TestError>,
    pub log: Vec<LogEntry>,
}

impl TestResult {
    fn ignored(test: Test) -> Self {
        let now = Instant::now();
        let at = Utc::now();
        Self {
            verdict: Verdict::Ignored,
            started: now,
            finished: now,
            started_at: at,
            finished_at: at,
            slow: false,
            test,
            exception: None,
            log: Vec::new(),
        }
    }

    fn completed(
        test: Test,
        started_at: DateTime<Utc>,
        (started, finished): (Instant, Instant),
        slow: Duration,
        exception: Option<TestError>,
        log: Vec<LogEntry>,
    ) -> Self {
        let verdict = if exception.is_some() {
            Verdict::Failure
        } else {
            Verdict::Success
        };
        Self {
            verdict,
            started,
            finished,
            started_at,
            finished_at: Utc::now(),
            slow: is_slow(started, finished, slow),
            test,
            exception,
            log,
        }
    }

    /// Time between start and finish
    pub fn duration(&self) -> Duration {
        self.finished.duration_since(self.started)
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    pub fn is_failure(&self) -> bool {
        self.verdict == Verdict::Failure
    }

    pub fn is_ignored(&self) -> bool {
        self.verdict == Verdict::Ignored
    }
}

/// Exactly reaching the threshold counts as slow
pub(crate) fn is_slow(started: Instant, finished: Instant, threshold: Duration) -> bool {
    finished.duration_since(started) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn sleeper(ms: u64) -> Test {
        Test::new("sleeper", move |_| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_sync_body_succeeds() {
        let test = Test::new("ok", |_| async { Ok(()) });
        let result = test.run().await;

        assert_eq!(result.verdict, Verdict::Success);
        assert!(result.exception.is_none());
        assert_eq!(result.test, test);
        assert!(result.started_at <= result.finished_at);
    }

    #[tokio::test]
    async fn test_value_of_any_type_is_ignored() {
        let test = Test::new("value", |_| async { Ok(vec![1, 2, 3]) });
        assert!(test.run().await.is_success());
    }

    #[tokio::test]
    async fn test_error_is_captured() {
        let test = Test::new("err", |_| async { Err::<(), _>(anyhow::anyhow!("foo")) });
        let result = test.run().await;

        assert_eq!(result.verdict, Verdict::Failure);
        match result.exception {
            Some(TestError::Failed(e)) => assert_eq!(e.to_string(), "foo"),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let test = Test::new("panics", |_| async {
            if true {
                panic!("oh no");
            }
            Ok(())
        });
        let result = test.run().await;

        assert_eq!(result.verdict, Verdict::Failure);
        match result.exception {
            Some(TestError::Panicked(msg)) => assert_eq!(msg, "oh no"),
            other => panic!("Expected Panicked, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_body_waits() {
        let test = sleeper(100);
        let result = test.run().await;

        assert!(result.is_success());
        assert!(result.duration() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_eventually_successful_body() {
        let test = sleeper(200);
        test.set_timeout(Duration::from_millis(100));
        let result = test.run().await;

        assert_eq!(result.verdict, Verdict::Failure);
        match result.exception {
            Some(TestError::TimedOut { timeout, elapsed }) => {
                assert_eq!(timeout, Duration::from_millis(100));
                assert!(elapsed >= Duration::from_millis(100));
                assert!(elapsed < Duration::from_millis(200));
            }
            other => panic!("Expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_timeout_applies_to_next_run() {
        let test = sleeper(200);
        assert!(test.run().await.is_success());

        test.set_timeout(Duration::from_millis(50));
        assert!(test.run().await.is_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_flag() {
        let slow = sleeper(200);
        slow.set_slow(Duration::from_millis(100));
        assert!(slow.run().await.slow);

        let fast = sleeper(10);
        fast.set_slow(Duration::from_millis(100));
        assert!(!fast.run().await.slow);
    }

    #[test]
    fn test_slow_boundary_is_inclusive() {
        let start = Instant::now();
        let threshold = Duration::from_millis(500);

        assert!(is_slow(start, start + threshold, threshold));
        assert!(!is_slow(start, start + Duration::from_millis(499), threshold));
        assert!(is_slow(start, start + Duration::from_millis(501), threshold));
    }

    #[tokio::test]
    async fn test_disabled_never_runs_body() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let test = Test::new("off", move |_| {
            counter.set(counter.get() + 1);
            async { Ok(()) }
        });
        test.disable();

        let result = test.run().await;
        assert_eq!(result.verdict, Verdict::Ignored);
        assert_eq!(result.started, result.finished);
        assert_eq!(result.started_at, result.finished_at);
        assert!(!result.slow);
        assert!(result.exception.is_none());
        assert_eq!(calls.get(), 0);

        test.enable();
        assert!(test.run().await.is_success());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_set_enabled_predicate() {
        let flag = Rc::new(Cell::new(false));
        let test = Test::new("toggle", |_| async { Ok(()) });
        let seen = Rc::clone(&flag);
        test.set_enabled(move || seen.get());

        assert!(test.run().await.is_ignored());
        flag.set(true);
        assert!(test.run().await.is_success());
    }

    #[test]
    fn test_mutators_chain() {
        let test = Test::new("chain", |_| async { Ok(()) });
        test.set_timeout(Duration::from_millis(10))
            .set_slow(Duration::from_millis(5))
            .disable();

        assert_eq!(test.timeout(), Duration::from_millis(10));
        assert_eq!(test.slow(), Duration::from_millis(5));
        assert!(!test.is_enabled());
    }

    #[test]
    fn test_defaults() {
        let test = Test::new("defaults", |_| async { Ok(()) });
        assert_eq!(test.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(test.slow(), DEFAULT_SLOW);
        assert_eq!(test.timeout_override(), None);
        assert!(test.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_are_captured() {
        let test = Test::new("logs", |cx| async move {
            cx.log("before");
            tokio::time::sleep(Duration::from_millis(10)).await;
            cx.log("after");
            Ok(())
        });
        let result = test.run().await;
        let messages: Vec<_> = result.log.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["before", "after"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_survive_timeout() {
        let test = Test::new("stuck", |cx| async move {
            cx.log("started");
            std::future::pending::<()>().await;
            Ok(())
        });
        test.set_timeout(Duration::from_millis(20));
        let result = test.run().await;

        assert!(result.exception.as_ref().is_some_and(TestError::is_timeout));
        assert_eq!(result.log.len(), 1);
    }

    #[test]
    fn test_full_title_without_parent() {
        let test = Test::new("alone", |_| async { Ok(()) });
        assert_eq!(test.full_title(), vec!["alone".to_string()]);

        let untitled = Test::new("", |_| async { Ok(()) });
        assert!(untitled.full_title().is_empty());
    }

    #[test]
    fn test_identity() {
        let a = Test::new("same", |_| async { Ok(()) });
        let b = Test::new("same", |_| async { Ok(()) });
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
