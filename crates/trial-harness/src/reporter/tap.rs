//! TAP reporter - Test Anything Protocol, version 13

use super::{display_title, Output, Reporter};
use std::cell::Cell;
use std::rc::Rc;
use trial_runtime::{Event, Report, Signal, TestResult};

/// Writes `ok`/`not ok` lines as results arrive, then the plan
///
/// Ignored tests are not numbered; they appear as `# ignored:` comments.
pub struct TapReporter {
    out: Output,
}

impl TapReporter {
    pub fn new(out: Output) -> Self {
        Self { out }
    }
}

impl Reporter for TapReporter {
    fn attach(&self, report: &Report) {
        let counter = Rc::new(Cell::new(0usize));
        self.out.line(format_args!("TAP version 13"));

        let (out, count) = (self.out.clone(), Rc::clone(&counter));
        report.on(Signal::Success, move |event| {
            if let Some(result) = event.result() {
                count.set(count.get() + 1);
                out.line(format_args!("ok {} {}", count.get(), display_title(&result.test)));
            }
        });

        let (out, count) = (self.out.clone(), Rc::clone(&counter));
        report.on(Signal::Failure, move |event| {
            if let Some(result) = event.result() {
                count.set(count.get() + 1);
                out.line(format_args!(
                    "not ok {} {}",
                    count.get(),
                    display_title(&result.test)
                ));
                out.line(format_args!("{}", describe_failure(result)));
            }
        });

        let out = self.out.clone();
        report.on(Signal::Ignored, move |event| {
            if let Some(result) = event.result() {
                out.line(format_args!("# ignored: {}", display_title(&result.test)));
            }
        });

        let (out, count) = (self.out.clone(), counter);
        report.on(Signal::Done, move |event| {
            if let Event::Done(report) = event {
                out.line(format_args!(""));
                out.line(format_args!("1..{}", count.get()));
                out.line(format_args!("# tests {}", count.get()));
                out.line(format_args!("# pass {}", report.passed_count()));
                out.line(format_args!("# fail {}", report.failed_count()));
                out.line(format_args!("# ignored {}", report.ignored_count()));
            }
        });
    }
}

/// YAML diagnostic block for a failed result
fn describe_failure(result: &TestResult) -> String {
    let (kind, message) = match &result.exception {
        Some(exception) => (exception.kind(), exception.to_string()),
        None => ("Error", String::new()),
    };

    let mut block = vec![
        "  ---".to_string(),
        format!("    type: {}", kind),
        "    message: >".to_string(),
        pad(6, &message),
        format!("    duration_ms: {}", result.duration().as_millis()),
    ];
    if !result.log.is_empty() {
        block.push("    log:".to_string());
        block.extend(result.log.iter().map(|entry| format!("      - {}", entry)));
    }
    block.push("  ...".to_string());
    block.join("\n")
}

fn pad(n: usize, text: &str) -> String {
    let indent = " ".repeat(n);
    text.lines()
        .map(|line| format!("{}{}", indent, line))
        .collect::<Vec<_>>()
        .join("\n")
}
