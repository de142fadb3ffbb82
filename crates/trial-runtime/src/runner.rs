//! Test runner - strictly sequential execution of tests and suites
//!
//! Items run one after another: the next item does not start until the
//! previous one has fully settled. Nested suites recurse through the runner
//! with the shared report, and their results are flattened into the output.
//!
//! A failed hook does not stop the run. What it guards is skipped, the rest
//! runs as usual, `done` is emitted, and only then is the first failure
//! handed back to the caller.

use crate::error::RunError;
use crate::report::{Event, Report, Signal};
use crate::suite::{HookedTest, Suite, SuiteItem};
use crate::test::{Test, TestResult};
use std::rc::Rc;

/// Something the runner can execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runnable {
    Test(Test),
    Suite(Suite),
}

impl Runnable {
    /// Title of the underlying test or suite
    pub fn title(&self) -> &str {
        match self {
            Runnable::Test(test) => test.title(),
            Runnable::Suite(suite) => suite.title(),
        }
    }
}

type Reporter = Rc<dyn Fn(&Report)>;

/// Test runner with configuration
#[derive(Clone, Default)]
pub struct TestRunner {
    /// Called once with the report before anything runs
    reporter: Option<Reporter>,
    /// Report shared with an enclosing run
    report: Option<Report>,
}

impl TestRunner {
    /// Create a runner that owns its report
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback that attaches observers before execution starts
    pub fn with_reporter(mut self, reporter: impl Fn(&Report) + 'static) -> Self {
        self.reporter = Some(Rc::new(reporter));
        self
    }

    /// Run into a report owned by an enclosing run
    ///
    /// The runner then neither records results on it nor marks it done, and
    /// resolves with only the results of its own items.
    pub fn with_report(mut self, report: Report) -> Self {
        self.report = Some(report);
        self
    }

    /// Run all items in order
    pub async fn run(&self, items: &[Runnable]) -> Result<Vec<Rc<TestResult>>, RunError> {
        let items = items.iter().cloned().map(SuiteItem::from).collect();
        run_items(items, self.reporter.as_deref(), self.report.clone())
            .await
            .into_result()
    }
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("reporter", &self.reporter.is_some())
            .field("report", &self.report)
            .finish()
    }
}

/// Run top-level items with a fresh report
///
/// Resolves once `done` has been emitted: with every result of the run, or
/// with the first hook failure if there was one.
pub async fn run(
    items: &[Runnable],
    reporter: Option<&dyn Fn(&Report)>,
) -> Result<Vec<Rc<TestResult>>, RunError> {
    let items = items.iter().cloned().map(SuiteItem::from).collect();
    run_items(items, reporter, None).await.into_result()
}

/// Results of a stretch of the run plus the first hook failure in it
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub(crate) results: Vec<Rc<TestResult>>,
    pub(crate) error: Option<RunError>,
}

impl Outcome {
    pub(crate) fn failed(error: RunError) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error),
        }
    }

    /// Keep the first failure; later ones are only logged
    pub(crate) fn record(&mut self, error: RunError) {
        match &self.error {
            None => self.error = Some(error),
            Some(first) => tracing::error!(
                error = %error,
                first = %first,
                "hook failed after an earlier hook failure"
            ),
        }
    }

    fn absorb(&mut self, other: Outcome) {
        self.results.extend(other.results);
        if let Some(error) = other.error {
            self.record(error);
        }
    }

    pub(crate) fn into_result(self) -> Result<Vec<Rc<TestResult>>, RunError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.results),
        }
    }
}

pub(crate) async fn run_items(
    items: Vec<SuiteItem>,
    reporter: Option<&dyn Fn(&Report)>,
    report: Option<Report>,
) -> Outcome {
    let (report, owned) = match report {
        Some(report) => (report, false),
        None => (owned_report(), true),
    };
    if let Some(reporter) = reporter {
        reporter(&report);
    }

    if owned {
        tracing::info!(items = items.len(), "starting run");
    }

    let mut outcome = Outcome::default();
    for item in items {
        let step = match item {
            SuiteItem::Test(hooked) => run_test(&hooked, &report).await,
            SuiteItem::Suite(suite) => run_suite(&suite, &report).await,
        };
        outcome.absorb(step);
    }

    if !owned {
        return outcome;
    }

    report.done();
    tracing::info!(
        total = report.total(),
        passed = report.passed_count(),
        failed = report.failed_count(),
        ignored = report.ignored_count(),
        hook_failed = outcome.error.is_some(),
        "run finished"
    );
    Outcome {
        results: report.all(),
        error: outcome.error,
    }
}

/// A report that records every finished test on itself
fn owned_report() -> Report {
    let report = Report::new();
    let weak = report.downgrade();
    report.on(Signal::TestFinished, move |event| {
        if let (Event::TestFinished(result, _), Some(report)) = (event, weak.upgrade()) {
            report.add(Rc::clone(*result));
        }
    });
    report
}

async fn run_test(hooked: &HookedTest, report: &Report) -> Outcome {
    let test = hooked.test();
    report.emit(&Event::TestStarted(test));
    let (result, teardown) = match hooked.execute().await {
        Ok(ran) => ran,
        Err(error) => {
            tracing::warn!(test = %test, "beforeEach failed, skipping test");
            return Outcome::failed(error);
        }
    };
    tracing::debug!(
        test = %test,
        verdict = %result.verdict,
        elapsed_ms = result.duration().as_millis() as u64,
        "test finished"
    );
    report.emit(&Event::TestFinished(&result, test));
    Outcome {
        results: vec![result],
        error: teardown,
    }
}

async fn run_suite(suite: &Suite, report: &Report) -> Outcome {
    report.emit(&Event::SuiteStarted(suite));
    tracing::debug!(suite = %suite, "suite started");
    let outcome = suite.execute(report).await;
    report.emit(&Event::SuiteFinished(&outcome.results, suite));
    outcome
}
