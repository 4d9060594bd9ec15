//! Result recording for a scenario run

use bevy::log::{info, warn};
use chrono::{DateTime, Utc};
use std::fmt;

/// How much a recorded outcome matters to the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Narration only, never fails a scenario
    Info,
    /// Ordinary assertion
    Result,
    /// Assertion whose failure stops the rest of the scenario body
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Result => "RESULT",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Human-readable description of an assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Distinct messages for the passing and failing outcome
    Pair { pass: String, fail: String },
    /// One description used for both outcomes
    Single(String),
}

impl Label {
    pub fn pair(pass: impl Into<String>, fail: impl Into<String>) -> Self {
        Label::Pair {
            pass: pass.into(),
            fail: fail.into(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Label::Pair { pass, .. } => pass,
            Label::Single(desc) => desc,
        }
    }

    pub fn message_for(&self, success: bool) -> &str {
        match self {
            Label::Pair { pass, fail } => {
                if success {
                    pass
                } else {
                    fail
                }
            }
            Label::Single(desc) => desc,
        }
    }
}

impl From<(&str, &str)> for Label {
    fn from((pass, fail): (&str, &str)) -> Self {
        Label::pair(pass, fail)
    }
}

impl From<(String, String)> for Label {
    fn from((pass, fail): (String, String)) -> Self {
        Label::Pair { pass, fail }
    }
}

impl From<&str> for Label {
    fn from(desc: &str) -> Self {
        Label::Single(desc.to_string())
    }
}

impl From<String> for Label {
    fn from(desc: String) -> Self {
        Label::Single(desc)
    }
}

/// One recorded outcome
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub description: String,
    pub success: bool,
    pub message: String,
    pub severity: Severity,
    pub recorded_at: DateTime<Utc>,
}

impl TestResult {
    fn new(label: &Label, success: bool, severity: Severity) -> Self {
        Self {
            description: label.description().to_string(),
            success,
            message: label.message_for(success).to_string(),
            severity,
            recorded_at: Utc::now(),
        }
    }

    /// Whether this record counts against the verdict
    pub fn is_failure(&self) -> bool {
        !self.success && self.severity != Severity::Info
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match (self.severity, self.success) {
            (Severity::Info, _) => "Info",
            (_, true) => "Success",
            (Severity::Critical, false) => "Critical Failure",
            (_, false) => "Failure",
        };
        write!(f, "{}: {}", prefix, self.message)
    }
}

/// Ordered log of outcomes for one scenario
#[derive(Debug, Default, Clone)]
pub struct ResultSink {
    prefix: Option<String>,
    records: Vec<TestResult>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose log output is tagged with the scenario name
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            records: Vec::new(),
        }
    }

    /// Record an ordinary assertion and hand the condition back
    pub fn result(&mut self, label: impl Into<Label>, condition: bool) -> bool {
        self.push(TestResult::new(&label.into(), condition, Severity::Result));
        condition
    }

    /// Record an assertion whose failure should end the scenario body
    pub fn critical_result(&mut self, label: impl Into<Label>, condition: bool) -> bool {
        self.push(TestResult::new(&label.into(), condition, Severity::Critical));
        condition
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let label = Label::Single(message.into());
        self.push(TestResult::new(&label, true, Severity::Info));
    }

    fn push(&mut self, record: TestResult) {
        let tag = self.prefix.as_deref().unwrap_or("scenario");
        if record.is_failure() {
            warn!("{}: {}", tag, record);
        } else {
            info!("{}: {}", tag, record);
        }
        self.records.push(record);
    }

    /// True iff no RESULT or CRITICAL record failed
    pub fn passed(&self) -> bool {
        !self.records.iter().any(TestResult::is_failure)
    }

    pub fn has_critical_failure(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.severity == Severity::Critical && !r.success)
    }

    pub fn records(&self) -> &[TestResult] {
        &self.records
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.records.iter().filter(|r| r.is_failure())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One line per record, in execution order
    pub fn lines(&self) -> Vec<String> {
        self.records.iter().map(ToString::to_string).collect()
    }

    pub fn into_records(self) -> Vec<TestResult> {
        self.records
    }
}
