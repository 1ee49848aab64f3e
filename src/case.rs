//! Test cases and their outcomes

use std::fmt;
use std::time::Duration;

/// A single test case decoded from a spec file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Name from the case header (not guaranteed unique)
    pub name: String,
    /// Script text handed to the shell
    pub code: String,
    /// Expected stdout; `None` means stdout is not checked
    pub expected_stdout: Option<String>,
    /// Expected exit status
    pub expected_status: i32,
    /// Known unsupported by the active dialect: never executed, reported as N-I
    pub not_implemented: bool,
    /// 1-based line number of the case header
    pub line: usize,
}

/// The classification of one executed (or skipped) case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pass,
    Fail,
    NotImplemented,
    Error,
    Timeout,
}

impl Outcome {
    /// The token printed in reports
    pub fn token(self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::NotImplemented => "N-I",
            Outcome::Error => "ERROR",
            Outcome::Timeout => "TIMEOUT",
        }
    }

    /// Whether this outcome gets a `FAIL:` detail line and spoils the exit status
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Fail | Outcome::Error | Outcome::Timeout)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Result of running a single case
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Case name
    pub name: String,
    pub outcome: Outcome,
    /// Diagnostic text; empty on PASS
    pub message: String,
    /// Unified diff of expected vs. actual stdout, when stdout mismatched
    pub diff: Option<String>,
    pub duration: Duration,
}

impl CaseResult {
    pub fn new(name: impl Into<String>, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome,
            message: message.into(),
            diff: None,
            duration: Duration::ZERO,
        }
    }
}
