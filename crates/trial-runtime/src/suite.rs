//! Suite - a named, ordered group of tests and nested suites
//!
//! Hook semantics:
//! - `beforeAll` runs once before any child, `afterAll` once after all of them
//! - `beforeEach`/`afterEach` wrap every test added directly to this suite
//!   (not the tests of nested suites, which have their own hooks)
//! - `afterEach` callbacks receive the result of the test they follow
//! - A teardown hook runs whenever its matching setup completed, even if tests
//!   failed or a sibling's hook failed; it is skipped if the setup failed
//! - A failed hook skips only what it guards: `beforeAll` the whole suite,
//!   `beforeEach` its test. Siblings keep running and the first failure is
//!   returned as `RunError::Hook` once everything has settled

use crate::error::RunError;
use crate::hook::{Hook, HookKind};
use crate::report::Report;
use crate::runner::{self, Outcome, Runnable};
use crate::test::{Test, TestResult};
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

struct SuiteInner {
    title: String,
    parent: Option<WeakSuite>,
    items: RefCell<Vec<SuiteItem>>,
    hooks: Rc<SuiteHooks>,
}

/// The four hooks of a suite, shared with the tests it wraps
pub(crate) struct SuiteHooks {
    owner: Weak<SuiteInner>,
    before_all: RefCell<Hook>,
    before_each: RefCell<Hook>,
    after_all: RefCell<Hook>,
    after_each: RefCell<Hook<Rc<TestResult>>>,
}

impl SuiteHooks {
    fn new(owner: Weak<SuiteInner>) -> Self {
        Self {
            owner,
            before_all: RefCell::new(Hook::new()),
            before_each: RefCell::new(Hook::new()),
            after_all: RefCell::new(Hook::new()),
            after_each: RefCell::new(Hook::new()),
        }
    }

    fn len(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::BeforeAll => self.before_all.borrow().len(),
            HookKind::BeforeEach => self.before_each.borrow().len(),
            HookKind::AfterAll => self.after_all.borrow().len(),
            HookKind::AfterEach => self.after_each.borrow().len(),
        }
    }

    fn owner_title(&self) -> Vec<String> {
        self.owner
            .upgrade()
            .map(|inner| Suite { inner }.full_title())
            .unwrap_or_default()
    }

    // Each runner snapshots its hook first so no borrow is held while
    // callbacks run; a callback may attach more hooks.

    async fn before_all(&self) -> Result<(), RunError> {
        let hook = self.before_all.borrow().clone();
        self.run(HookKind::BeforeAll, hook, ()).await
    }

    async fn before_each(&self) -> Result<(), RunError> {
        let hook = self.before_each.borrow().clone();
        self.run(HookKind::BeforeEach, hook, ()).await
    }

    async fn after_all(&self) -> Result<(), RunError> {
        let hook = self.after_all.borrow().clone();
        self.run(HookKind::AfterAll, hook, ()).await
    }

    async fn after_each(&self, result: Rc<TestResult>) -> Result<(), RunError> {
        let hook = self.after_each.borrow().clone();
        self.run(HookKind::AfterEach, hook, result).await.map(drop)
    }

    async fn run<T: 'static>(
        &self,
        kind: HookKind,
        hook: Hook<T>,
        value: T,
    ) -> Result<T, RunError> {
        if hook.is_empty() {
            return Ok(value);
        }
        tracing::trace!(hook = %kind, callbacks = hook.len(), "running hook");
        hook.run(value)
            .await
            .map_err(|source| RunError::hook(kind, self.owner_title(), source))
    }
}

/// Non-owning suite reference used for parent links
#[derive(Clone)]
pub(crate) struct WeakSuite(Weak<SuiteInner>);

impl WeakSuite {
    pub(crate) fn upgrade(&self) -> Option<Suite> {
        self.0.upgrade().map(|inner| Suite { inner })
    }
}

/// A test as registered in a suite: the original test plus the suite's
/// per-test hooks
#[derive(Clone)]
pub struct HookedTest {
    test: Test,
    hooks: Option<Rc<SuiteHooks>>,
}

impl HookedTest {
    /// A test that runs without any surrounding hooks
    pub(crate) fn bare(test: Test) -> Self {
        Self { test, hooks: None }
    }

    /// The test this wraps, as the caller declared it
    pub fn test(&self) -> &Test {
        &self.test
    }

    /// Run `beforeEach`, the test, then `afterEach`
    ///
    /// `afterEach` sees the test's result, which is also the output; a
    /// failing `afterEach` turns it into an error.
    pub async fn run(&self) -> Result<Rc<TestResult>, RunError> {
        match self.execute().await? {
            (_, Some(teardown)) => Err(teardown),
            (result, None) => Ok(result),
        }
    }

    /// Like [`HookedTest::run`], but keeps the result when only `afterEach`
    /// failed
    ///
    /// An error means `beforeEach` failed and the test was skipped.
    pub(crate) async fn execute(&self) -> Result<(Rc<TestResult>, Option<RunError>), RunError> {
        let Some(hooks) = &self.hooks else {
            return Ok((Rc::new(self.test.run().await), None));
        };
        hooks.before_each().await?;
        let result = Rc::new(self.test.run().await);
        let teardown = hooks.after_each(Rc::clone(&result)).await.err();
        Ok((result, teardown))
    }
}

impl fmt::Debug for HookedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedTest")
            .field("test", &self.test)
            .field("hooked", &self.hooks.is_some())
            .finish()
    }
}

/// One entry of a suite, in declaration order
#[derive(Debug, Clone)]
pub enum SuiteItem {
    Test(HookedTest),
    Suite(Suite),
}

impl SuiteItem {
    pub fn as_test(&self) -> Option<&Test> {
        match self {
            SuiteItem::Test(hooked) => Some(hooked.test()),
            SuiteItem::Suite(_) => None,
        }
    }

    pub fn as_suite(&self) -> Option<&Suite> {
        match self {
            SuiteItem::Suite(suite) => Some(suite),
            SuiteItem::Test(_) => None,
        }
    }
}

impl From<Runnable> for SuiteItem {
    fn from(runnable: Runnable) -> Self {
        match runnable {
            Runnable::Test(test) => SuiteItem::Test(HookedTest::bare(test)),
            Runnable::Suite(suite) => SuiteItem::Suite(suite),
        }
    }
}

/// A group of tests
#[derive(Clone)]
pub struct Suite {
    inner: Rc<SuiteInner>,
}

impl Suite {
    /// Create a top-level suite
    pub fn new(title: impl Into<String>) -> Self {
        Self::build(None, title.into())
    }

    /// Create a suite and register it in `parent`
    pub fn new_in(parent: &Suite, title: impl Into<String>) -> Self {
        let suite = Self::build(Some(parent.downgrade()), title.into());
        parent.add(Runnable::Suite(suite.clone()));
        suite
    }

    fn build(parent: Option<WeakSuite>, title: String) -> Self {
        let inner = Rc::new_cyclic(|weak| SuiteInner {
            title,
            parent,
            items: RefCell::new(Vec::new()),
            hooks: Rc::new(SuiteHooks::new(weak.clone())),
        });
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> WeakSuite {
        WeakSuite(Rc::downgrade(&self.inner))
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn parent(&self) -> Option<Suite> {
        self.inner.parent.as_ref().and_then(WeakSuite::upgrade)
    }

    /// Non-empty titles from the outermost suite down to this one
    pub fn full_title(&self) -> Vec<String> {
        let mut title = self.parent().map(|p| p.full_title()).unwrap_or_default();
        if !self.inner.title.is_empty() {
            title.push(self.inner.title.clone());
        }
        title
    }

    /// Append a test or suite
    ///
    /// Tests are wrapped so this suite's `beforeEach`/`afterEach` run around
    /// them; the test itself is left untouched. A suite must not be added to
    /// itself or to one of its own descendants.
    pub fn add(&self, item: impl Into<Runnable>) -> &Self {
        let item = match item.into() {
            Runnable::Test(test) => SuiteItem::Test(HookedTest {
                test,
                hooks: Some(Rc::clone(&self.inner.hooks)),
            }),
            Runnable::Suite(suite) => SuiteItem::Suite(suite),
        };
        self.inner.items.borrow_mut().push(item);
        self
    }

    /// Children in insertion order
    pub fn tests(&self) -> Vec<SuiteItem> {
        self.inner.items.borrow().clone()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Every test in this suite and its descendants, in run order
    pub fn all_tests(&self) -> Vec<Test> {
        let mut tests = Vec::new();
        for item in self.tests() {
            match item {
                SuiteItem::Test(hooked) => tests.push(hooked.test),
                SuiteItem::Suite(suite) => tests.extend(suite.all_tests()),
            }
        }
        tests
    }

    /// Number of callbacks attached to one of this suite's hooks
    pub fn hook_len(&self, kind: HookKind) -> usize {
        self.inner.hooks.len(kind)
    }

    pub fn before_all<F, Fut>(&self, callback: F) -> &Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        attach(&self.inner.hooks.before_all, callback);
        self
    }

    pub fn before_each<F, Fut>(&self, callback: F) -> &Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        attach(&self.inner.hooks.before_each, callback);
        self
    }

    pub fn after_all<F, Fut>(&self, callback: F) -> &Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        attach(&self.inner.hooks.after_all, callback);
        self
    }

    /// Attach a callback run after each test with that test's result
    ///
    /// It runs for failed, panicked and timed-out tests alike.
    pub fn after_each<F, Fut>(&self, callback: F) -> &Self
    where
        F: Fn(Rc<TestResult>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.inner
            .hooks
            .after_each
            .borrow_mut()
            .attach(move |result: Rc<TestResult>| {
                let observed = callback(Rc::clone(&result));
                async move {
                    observed.await?;
                    Ok(result)
                }
            });
        self
    }

    /// Run `beforeAll`, every child in order, then `afterAll`
    ///
    /// Results are recorded on `report` as they come in; the returned vector
    /// holds just this suite's results, nested suites flattened.
    pub fn run(
        &self,
        report: &Report,
    ) -> LocalBoxFuture<'static, Result<Vec<Rc<TestResult>>, RunError>> {
        self.execute(report).map(Outcome::into_result).boxed_local()
    }

    /// Like [`Suite::run`], but keeps the results of children that ran
    /// alongside the first hook failure
    pub(crate) fn execute(&self, report: &Report) -> LocalBoxFuture<'static, Outcome> {
        let suite = self.clone();
        let report = report.clone();
        async move {
            let hooks = Rc::clone(&suite.inner.hooks);
            if let Err(error) = hooks.before_all().await {
                tracing::warn!(suite = %suite, "beforeAll failed, skipping suite");
                return Outcome::failed(error);
            }

            let mut outcome = runner::run_items(suite.tests(), None, Some(report)).await;
            if let Err(error) = hooks.after_all().await {
                outcome.record(error);
            }
            outcome
        }
        .boxed_local()
    }
}

fn attach<F, Fut>(slot: &RefCell<Hook>, callback: F)
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    slot.borrow_mut().attach(move |()| callback());
}

impl From<Suite> for Runnable {
    fn from(suite: Suite) -> Self {
        Runnable::Suite(suite)
    }
}

impl From<Test> for Runnable {
    fn from(test: Test) -> Self {
        Runnable::Test(test)
    }
}

impl PartialEq for Suite {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Suite {}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("title", &self.inner.title)
            .field("items", &self.inner.items.borrow().len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_title().join(" "))
    }
}
