//! Summary reporter - progress dots or one line per test, then a summary

use super::{display_title, Output, Reporter};
use colored::*;
use std::rc::Rc;
use trial_runtime::{Event, Report, Signal, TestError, TestResult, Verdict};

/// Human-readable reporter with output configuration
pub struct SummaryReporter {
    /// Show a line for each test instead of a dot
    verbose: bool,
    out: Output,
}

impl SummaryReporter {
    /// Create a new summary reporter
    pub fn new(verbose: bool, out: Output) -> Self {
        Self { verbose, out }
    }
}

impl Reporter for SummaryReporter {
    fn attach(&self, report: &Report) {
        let out = self.out.clone();
        let verbose = self.verbose;
        report.on(Signal::Result, move |event| {
            if let Some(result) = event.result() {
                print_test_result(&out, verbose, result);
            }
        });

        let out = self.out.clone();
        let verbose = self.verbose;
        report.on(Signal::Done, move |event| {
            if let Event::Done(report) = event {
                // Dots need a newline before the summary
                if !verbose && report.total() > 0 {
                    out.line(format_args!(""));
                }
                out.line(format_args!(""));
                print_summary(&out, report);
                print_failures(&out, &report.failed());
            }
        });
    }
}

/// Print a single test result
fn print_test_result(out: &Output, verbose: bool, result: &TestResult) {
    if !verbose {
        let mark = match result.verdict {
            Verdict::Success => ".".green(),
            Verdict::Failure if is_timeout(result) => "T".yellow().bold(),
            Verdict::Failure => "F".red().bold(),
            Verdict::Ignored => "S".dimmed(),
        };
        out.write(format_args!("{}", mark));
        return;
    }

    let title = display_title(&result.test);
    match result.verdict {
        Verdict::Success => {
            let slow = if result.slow {
                format!(" {}", "slow".yellow())
            } else {
                String::new()
            };
            out.line(format_args!(
                "{} {} ({:.2?}){}",
                "PASS".green().bold(),
                title,
                result.duration(),
                slow
            ));
        }
        Verdict::Failure if is_timeout(result) => {
            out.line(format_args!(
                "{} {} (timeout after {:.2?})",
                "TIMEOUT".yellow().bold(),
                title,
                result.duration()
            ));
        }
        Verdict::Failure => {
            out.line(format_args!(
                "{} {} ({:.2?})",
                "FAIL".red().bold(),
                title,
                result.duration()
            ));
        }
        Verdict::Ignored => {
            out.line(format_args!("{} {}", "SKIP".dimmed().bold(), title));
        }
    }
}

fn is_timeout(result: &TestResult) -> bool {
    result.exception.as_ref().is_some_and(TestError::is_timeout)
}

/// Print summary statistics
fn print_summary(out: &Output, report: &Report) {
    let failed = report.failed_count();

    out.line(format_args!("{}", "─".repeat(50)));

    let status = if failed > 0 || report.total() == 0 {
        "FAILED".red().bold()
    } else {
        "PASSED".green().bold()
    };

    out.line(format_args!(
        "Test result: {} | {} total, {} passed, {} failed, {} ignored",
        status,
        report.total().to_string().bold(),
        report.passed_count().to_string().green().bold(),
        if failed > 0 {
            failed.to_string().red().bold()
        } else {
            failed.to_string().normal()
        },
        report.ignored_count()
    ));

    let slow = report.slow().len();
    if slow > 0 {
        out.line(format_args!("{} slow", slow.to_string().yellow()));
    }
    if let Some(duration) = report.duration() {
        out.line(format_args!("Time: {:.2?}", duration));
    }
}

/// Print details of failed tests
fn print_failures(out: &Output, failures: &[Rc<TestResult>]) {
    if failures.is_empty() {
        return;
    }

    out.line(format_args!(""));
    out.line(format_args!("{}", "Failures:".red().bold()));
    out.line(format_args!(""));

    for result in failures {
        out.line(format_args!("  {} {}", "●".red(), display_title(&result.test).bold()));

        if let Some(exception) = &result.exception {
            if exception.is_timeout() {
                out.line(format_args!(
                    "      {} after {:.2?}",
                    "Timed out".yellow(),
                    result.duration()
                ));
            } else {
                for line in exception.to_string().lines() {
                    out.line(format_args!("      {}", line.dimmed()));
                }
            }
        }
        for entry in &result.log {
            out.line(format_args!("      {} {}", "log:".dimmed(), entry));
        }
        out.line(format_args!(""));
    }
}
