//! JSON reporter - one document written when the run is done

use super::{Output, Reporter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use trial_runtime::{Event, LogEntry, Report, Signal, TestResult, Verdict};

/// Writes a single JSON document describing the whole run
pub struct JsonReporter {
    out: Output,
}

impl JsonReporter {
    pub fn new(out: Output) -> Self {
        Self { out }
    }
}

#[derive(Debug, Serialize)]
struct RunDocument<'a> {
    tests: usize,
    passed: usize,
    failed: usize,
    ignored: usize,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
    duration_ms: u128,
    results: Vec<ResultDocument<'a>>,
}

#[derive(Debug, Serialize)]
struct ResultDocument<'a> {
    title: Vec<String>,
    verdict: Verdict,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: u128,
    slow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDocument>,
    #[serde(skip_serializing_if = "<[LogEntry]>::is_empty")]
    log: &'a [LogEntry],
}

#[derive(Debug, Serialize)]
struct ErrorDocument {
    kind: &'static str,
    message: String,
}

impl<'a> ResultDocument<'a> {
    fn new(result: &'a TestResult) -> Self {
        Self {
            title: result.test.full_title(),
            verdict: result.verdict,
            started_at: result.started_at,
            finished_at: result.finished_at,
            duration_ms: result.duration().as_millis(),
            slow: result.slow,
            error: result.exception.as_ref().map(|e| ErrorDocument {
                kind: e.kind(),
                message: e.to_string(),
            }),
            log: &result.log,
        }
    }
}

/// Render the report as a JSON document
pub fn to_json(report: &Report) -> serde_json::Result<String> {
    let all = report.all();
    let document = RunDocument {
        tests: report.total(),
        passed: report.passed_count(),
        failed: report.failed_count(),
        ignored: report.ignored_count(),
        started_at: report.started_at(),
        finished_at: report.finished_at(),
        duration_ms: report.duration().map(|d| d.as_millis()).unwrap_or_default(),
        results: all.iter().map(|r| ResultDocument::new(r)).collect(),
    };
    serde_json::to_string_pretty(&document)
}

impl Reporter for JsonReporter {
    fn attach(&self, report: &Report) {
        let out = self.out.clone();
        report.on(Signal::Done, move |event| {
            if let Event::Done(report) = event {
                match to_json(report) {
                    Ok(json) => out.line(format_args!("{}", json)),
                    Err(err) => tracing::error!(error = %err, "failed to serialize report"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::testing::{mixed_suite, render};
    use crate::reporter::SharedBuffer;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use trial_runtime::Runnable;

    #[test]
    fn test_json_document() {
        let buffer = SharedBuffer::new();
        let reporter = JsonReporter::new(Output::new(buffer.clone()));
        let output = render(&reporter, &buffer, &[Runnable::Suite(mixed_suite())]);

        let doc: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(doc["tests"], 3);
        assert_eq!(doc["passed"], 1);
        assert_eq!(doc["failed"], 1);
        assert_eq!(doc["ignored"], 1);

        let results = doc["results"].as_array().unwrap();
        assert_eq!(results[0]["title"], serde_json::json!(["math", "adds"]));
        assert_eq!(results[0]["verdict"], "success");
        assert!(results[0].get("error").is_none());

        assert_eq!(results[1]["verdict"], "failure");
        assert_eq!(results[1]["error"]["kind"], "Error");
        assert_eq!(results[1]["error"]["message"], "division by zero\nat line 3");
        assert_eq!(results[1]["log"][0]["message"], "dividing by zero");

        assert_eq!(results[2]["verdict"], "ignored");
    }

    #[test]
    fn test_json_timestamps_are_rfc3339() {
        let buffer = SharedBuffer::new();
        let reporter = JsonReporter::new(Output::new(buffer.clone()));
        let output = render(&reporter, &buffer, &[Runnable::Suite(mixed_suite())]);
        let doc: Value = serde_json::from_str(&output).unwrap();

        let stamp = |value: &Value| {
            DateTime::parse_from_rfc3339(value.as_str().unwrap())
                .unwrap()
                .with_timezone(&Utc)
        };
        let run_started = stamp(&doc["started_at"]);
        let run_finished = stamp(&doc["finished_at"]);
        assert!(run_started <= run_finished);

        for result in doc["results"].as_array().unwrap() {
            let started = stamp(&result["started_at"]);
            let finished = stamp(&result["finished_at"]);
            assert!(run_started <= started);
            assert!(started <= finished);
            assert!(finished <= run_finished);
        }
    }

    #[test]
    fn test_nothing_written_before_done() {
        let buffer = SharedBuffer::new();
        let reporter = JsonReporter::new(Output::new(buffer.clone()));
        let report = Report::new();
        reporter.attach(&report);
        assert_eq!(buffer.contents(), "");

        report.done();
        let doc: Value = serde_json::from_str(&buffer.contents()).unwrap();
        assert_eq!(doc["tests"], 0);
    }
}
