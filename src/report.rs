//! Per-file outcome tallies and rendering

use std::path::Path;
use std::time::Duration;

use crate::case::{CaseResult, Outcome};

/// What the report shows beyond the summary line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Failure detail lines; in verbose mode also passing cases and diffs
    #[default]
    All,
    /// Failure detail lines only
    OnlyFailures,
}

/// Results of all cases of one spec file, in case order
#[derive(Debug)]
pub struct Report {
    /// Spec file base name
    pub file: String,
    pub results: Vec<CaseResult>,
    /// Total duration
    pub duration: Duration,
}

impl Report {
    pub fn new(path: &Path) -> Self {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            file,
            results: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn push(&mut self, result: CaseResult) {
        self.results.push(result);
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.count(Outcome::Pass)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Outcome::Fail)
    }

    pub fn not_implemented_count(&self) -> usize {
        self.count(Outcome::NotImplemented)
    }

    pub fn error_count(&self) -> usize {
        self.count(Outcome::Error)
    }

    pub fn timeout_count(&self) -> usize {
        self.count(Outcome::Timeout)
    }

    /// No FAIL, ERROR or TIMEOUT. N-I does not matter.
    pub fn all_clear(&self) -> bool {
        self.failed_count() == 0 && self.error_count() == 0 && self.timeout_count() == 0
    }

    /// Format the summary line
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed, {} failed, {} N-I, {} errors, {} timeouts",
            self.file,
            self.passed_count(),
            self.total(),
            self.failed_count(),
            self.not_implemented_count(),
            self.error_count(),
            self.timeout_count(),
        )
    }

    /// `  FAIL: name: message` for every FAIL, ERROR and TIMEOUT, in case order
    pub fn failure_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| format!("  FAIL: {}: {}", r.name, r.message))
            .collect()
    }

    /// All output lines for this file: summary first, then details.
    pub fn render(&self, mode: DisplayMode, verbose: bool) -> Vec<String> {
        let mut lines = vec![self.summary()];
        if mode == DisplayMode::OnlyFailures || !verbose {
            lines.extend(self.failure_lines());
            return lines;
        }

        for r in &self.results {
            match r.outcome {
                Outcome::Pass => lines.push(format!("  PASS: {} ({}ms)", r.name, r.duration.as_millis())),
                Outcome::NotImplemented => lines.push(format!("  N-I: {}: {}", r.name, r.message)),
                _ => {
                    lines.push(format!("  FAIL: {}: {}", r.name, r.message));
                    if let Some(ref diff) = r.diff {
                        for line in diff.lines() {
                            lines.push(format!("      {}", line));
                        }
                    }
                }
            }
        }
        lines
    }
}
