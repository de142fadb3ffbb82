//! Report - results of a run, bucketed by verdict
//!
//! Observers subscribe per signal. Signal names are stable and match the
//! strings reporters have always used:
//!
//! | Signal          | Payload              |
//! |-----------------|----------------------|
//! | `done`          | Report               |
//! | `result`        | Result               |
//! | `success`       | Result               |
//! | `failure`       | Result               |
//! | `ignored`       | Result               |
//! | `test:started`  | Test                 |
//! | `test:finished` | (Result, Test)       |
//! | `suite:started` | Suite                |
//! | `suite:finished`| (Results, Suite)     |

use crate::suite::Suite;
use crate::test::{Test, TestResult, Verdict};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Names of the notifications a Report emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Done,
    Result,
    Success,
    Failure,
    Ignored,
    TestStarted,
    TestFinished,
    SuiteStarted,
    SuiteFinished,
}

impl Signal {
    pub const ALL: [Signal; 9] = [
        Signal::Done,
        Signal::Result,
        Signal::Success,
        Signal::Failure,
        Signal::Ignored,
        Signal::TestStarted,
        Signal::TestFinished,
        Signal::SuiteStarted,
        Signal::SuiteFinished,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Done => "done",
            Signal::Result => "result",
            Signal::Success => "success",
            Signal::Failure => "failure",
            Signal::Ignored => "ignored",
            Signal::TestStarted => "test:started",
            Signal::TestFinished => "test:finished",
            Signal::SuiteStarted => "suite:started",
            Signal::SuiteFinished => "suite:finished",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown signal '{0}'")]
pub struct UnknownSignal(pub String);

impl FromStr for Signal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .into_iter()
            .find(|signal| signal.name() == s)
            .ok_or_else(|| UnknownSignal(s.to_string()))
    }
}

/// A notification together with its payload
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Done(&'a Report),
    Result(&'a Rc<TestResult>),
    Success(&'a Rc<TestResult>),
    Failure(&'a Rc<TestResult>),
    Ignored(&'a Rc<TestResult>),
    TestStarted(&'a Test),
    TestFinished(&'a Rc<TestResult>, &'a Test),
    SuiteStarted(&'a Suite),
    SuiteFinished(&'a [Rc<TestResult>], &'a Suite),
}

impl Event<'_> {
    pub fn signal(&self) -> Signal {
        match self {
            Event::Done(_) => Signal::Done,
            Event::Result(_) => Signal::Result,
            Event::Success(_) => Signal::Success,
            Event::Failure(_) => Signal::Failure,
            Event::Ignored(_) => Signal::Ignored,
            Event::TestStarted(_) => Signal::TestStarted,
            Event::TestFinished(..) => Signal::TestFinished,
            Event::SuiteStarted(_) => Signal::SuiteStarted,
            Event::SuiteFinished(..) => Signal::SuiteFinished,
        }
    }

    /// The single result this event carries, if any
    pub fn result(&self) -> Option<&TestResult> {
        match *self {
            Event::Result(r)
            | Event::Success(r)
            | Event::Failure(r)
            | Event::Ignored(r)
            | Event::TestFinished(r, _) => Some(&**r),
            _ => None,
        }
    }
}

type Listener = Rc<dyn Fn(&Event<'_>)>;

/// Handle returned by `Report::on`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    signal: Signal,
    listener: Listener,
}

struct ReportInner {
    started: Instant,
    finished: Cell<Option<Instant>>,
    started_at: DateTime<Utc>,
    finished_at: Cell<Option<DateTime<Utc>>>,
    all: RefCell<Vec<Rc<TestResult>>>,
    passed: RefCell<Vec<Rc<TestResult>>>,
    failed: RefCell<Vec<Rc<TestResult>>>,
    ignored: RefCell<Vec<Rc<TestResult>>>,
    listeners: RefCell<Vec<Registration>>,
    next_id: Cell<u64>,
}

/// Aggregated results of a run
///
/// Clones share state. Every result passed to `add` lands in `all` and in
/// exactly one verdict bucket.
#[derive(Clone)]
pub struct Report {
    inner: Rc<ReportInner>,
}

/// Non-owning report reference, for listeners that feed the report itself
#[derive(Clone)]
pub(crate) struct WeakReport(Weak<ReportInner>);

impl WeakReport {
    pub(crate) fn upgrade(&self) -> Option<Report> {
        self.0.upgrade().map(|inner| Report { inner })
    }
}

impl Report {
    /// Create an empty report; `started` is stamped now
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ReportInner {
                started: Instant::now(),
                finished: Cell::new(None),
                started_at: Utc::now(),
                finished_at: Cell::new(None),
                all: RefCell::new(Vec::new()),
                passed: RefCell::new(Vec::new()),
                failed: RefCell::new(Vec::new()),
                ignored: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakReport {
        WeakReport(Rc::downgrade(&self.inner))
    }

    /// Subscribe to a signal
    ///
    /// Listeners for the same signal are called in subscription order.
    pub fn on(&self, signal: Signal, listener: impl Fn(&Event<'_>) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push(Registration {
            id,
            signal,
            listener: Rc::new(listener),
        });
        id
    }

    /// Unsubscribe; returns false if the listener was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Number of listeners subscribed to `signal`
    pub fn listener_count(&self, signal: Signal) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|registration| registration.signal == signal)
            .count()
    }

    /// Notify every listener of the event's signal
    pub(crate) fn emit(&self, event: &Event<'_>) {
        let signal = event.signal();
        // Snapshot so listeners may subscribe or read the report while being notified
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|registration| registration.signal == signal)
            .map(|registration| Rc::clone(&registration.listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Record a result
    pub fn add(&self, result: Rc<TestResult>) -> &Self {
        self.inner.all.borrow_mut().push(Rc::clone(&result));

        let bucket = match result.verdict {
            Verdict::Success => &self.inner.passed,
            Verdict::Failure => &self.inner.failed,
            Verdict::Ignored => &self.inner.ignored,
        };
        bucket.borrow_mut().push(Rc::clone(&result));

        let event = match result.verdict {
            Verdict::Success => Event::Success(&result),
            Verdict::Failure => Event::Failure(&result),
            Verdict::Ignored => Event::Ignored(&result),
        };
        self.emit(&event);
        self.emit(&Event::Result(&result));
        self
    }

    /// Mark the report as complete and notify `done` listeners
    ///
    /// Only the first call has any effect.
    pub fn done(&self) -> &Self {
        if self.inner.finished.get().is_some() {
            tracing::warn!("report already marked done, ignoring");
            return self;
        }
        self.inner.finished.set(Some(Instant::now()));
        self.inner.finished_at.set(Some(Utc::now()));
        self.emit(&Event::Done(self));
        self
    }

    pub fn is_done(&self) -> bool {
        self.inner.finished.get().is_some()
    }

    pub fn started(&self) -> Instant {
        self.inner.started
    }

    pub fn finished(&self) -> Option<Instant> {
        self.inner.finished.get()
    }

    /// Calendar time the report was created
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Calendar time `done` was first called
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.inner.finished_at.get()
    }

    /// Wall time of the run, once done
    pub fn duration(&self) -> Option<Duration> {
        self.finished()
            .map(|finished| finished.duration_since(self.inner.started))
    }

    pub fn all(&self) -> Vec<Rc<TestResult>> {
        self.inner.all.borrow().clone()
    }

    pub fn passed(&self) -> Vec<Rc<TestResult>> {
        self.inner.passed.borrow().clone()
    }

    pub fn failed(&self) -> Vec<Rc<TestResult>> {
        self.inner.failed.borrow().clone()
    }

    pub fn ignored(&self) -> Vec<Rc<TestResult>> {
        self.inner.ignored.borrow().clone()
    }

    /// Number of results recorded
    pub fn total(&self) -> usize {
        self.inner.all.borrow().len()
    }

    pub fn passed_count(&self) -> usize {
        self.inner.passed.borrow().len()
    }

    pub fn failed_count(&self) -> usize {
        self.inner.failed.borrow().len()
    }

    pub fn ignored_count(&self) -> usize {
        self.inner.ignored.borrow().len()
    }

    /// Results flagged slow, in run order
    pub fn slow(&self) -> Vec<Rc<TestResult>> {
        self.inner
            .all
            .borrow()
            .iter()
            .filter(|result| result.slow)
            .cloned()
            .collect()
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("total", &self.total())
            .field("passed", &self.passed_count())
            .field("failed", &self.failed_count())
            .field("ignored", &self.ignored_count())
            .field("done", &self.is_done())
            .finish()
    }
}
