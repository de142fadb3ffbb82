//! Reporters - observers that render a run as it happens
//!
//! A reporter subscribes to a `Report` before execution starts and writes to
//! an `Output`. Nothing is buffered beyond what the writer itself buffers.

mod json;
mod summary;
mod tap;

pub use json::JsonReporter;
pub use summary::SummaryReporter;
pub use tap::TapReporter;

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use trial_config::OutputFormat;
use trial_runtime::{Report, Test};

/// Something that renders a run
pub trait Reporter {
    /// Subscribe to the report's signals
    fn attach(&self, report: &Report);
}

/// Shared writer handed to reporters
#[derive(Clone)]
pub struct Output {
    writer: Rc<RefCell<Box<dyn Write>>>,
}

impl Output {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: Rc::new(RefCell::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write a line; write errors are logged, never propagated into the run
    pub fn line(&self, args: fmt::Arguments<'_>) {
        self.write(format_args!("{}\n", args));
    }

    /// Write without a trailing newline and flush
    pub fn write(&self, args: fmt::Arguments<'_>) {
        let mut writer = self.writer.borrow_mut();
        if let Err(err) = writer.write_fmt(args).and_then(|()| writer.flush()) {
            tracing::warn!(error = %err, "failed to write reporter output");
        }
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Output")
    }
}

/// Build the reporter for `format`
pub fn for_format(format: OutputFormat, verbose: bool, out: Output) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Tap => Box::new(TapReporter::new(out)),
        OutputFormat::Summary => Box::new(SummaryReporter::new(verbose, out)),
        OutputFormat::Json => Box::new(JsonReporter::new(out)),
    }
}

/// Full title joined for display
pub(crate) fn display_title(test: &Test) -> String {
    test.full_title().join(" ")
}

/// In-memory writer for inspecting reporter output
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
