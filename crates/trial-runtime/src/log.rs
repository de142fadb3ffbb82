//! Scoped log capture for test bodies
//!
//! A test body does not print; it writes to the `LogSink` it is handed and
//! the entries end up on its `TestResult`. `LogCapture` owns the buffer for
//! the duration of one run. Once released, any sink clone still held (for
//! example by a task the body spawned) silently drops what it is given.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// One captured log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// When the entry was written
    pub date: DateTime<Utc>,
    /// What was logged
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            date: Utc::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Owner of a capture buffer
pub struct LogCapture {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl LogCapture {
    /// Open a new capture scope
    pub fn acquire() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Hand out a writer for this scope
    pub fn sink(&self) -> LogSink {
        LogSink {
            entries: Rc::downgrade(&self.entries),
        }
    }

    /// Close the scope and take everything captured so far
    pub fn release(self) -> Vec<LogEntry> {
        self.entries.take()
    }
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::acquire()
    }
}

/// Writer side of a capture scope
#[derive(Clone)]
pub struct LogSink {
    entries: Weak<RefCell<Vec<LogEntry>>>,
}

impl LogSink {
    /// A sink that is not attached to any scope
    pub fn detached() -> Self {
        Self {
            entries: Weak::new(),
        }
    }

    /// Record a message
    ///
    /// Returns false if the owning scope has already been released.
    pub fn log(&self, message: impl Into<String>) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let entry = LogEntry::new(message);
        tracing::debug!(target: "trial::log", "{}", entry.message);
        entries.borrow_mut().push(entry);
        true
    }

    /// Check if the owning scope is still open
    pub fn is_attached(&self) -> bool {
        self.entries.strong_count() > 0
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}
