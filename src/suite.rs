//! Spec file runner
//!
//! Reads a spec file, parses it, and runs every case in order, collecting a
//! [`Report`]. Cases run strictly one at a time.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::case::TestCase;
use crate::dialect::Dialect;
use crate::error::{ErrorKind, SpecError};
use crate::parser::SpecParser;
use crate::report::Report;
use crate::runner::{CaseRunner, RunConfig};

/// Parses and runs whole spec files
pub struct SuiteRunner {
    parser: SpecParser,
    runner: CaseRunner,
}

impl SuiteRunner {
    /// Create a suite runner with the given config
    pub fn new(config: RunConfig) -> Result<Self, SpecError> {
        if config.dialect.name().is_empty() {
            return Err(SpecError::new(ErrorKind::Other, "dialect name must not be empty"));
        }
        if config.timeout.is_zero() {
            return Err(SpecError::new(ErrorKind::Other, "timeout must be greater than zero"));
        }
        let parser = SpecParser::new(config.dialect.clone())
            .map_err(|e| SpecError::new(ErrorKind::Other, format!("invalid dialect pattern: {}", e)))?;
        Ok(Self {
            parser,
            runner: CaseRunner::new(config),
        })
    }

    pub fn config(&self) -> &RunConfig {
        self.runner.config()
    }

    /// Read and parse a spec file, applying the configured name filter
    pub fn load(&self, path: &Path) -> Result<Vec<TestCase>, SpecError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpecError::from(e).with_file(path.display().to_string()))?;
        let mut cases = self.parser.parse(&text);
        debug!(file = %path.display(), cases = cases.len(), "parsed spec file");

        if let Some(ref filter) = self.config().filter {
            cases.retain(|c| c.name.contains(filter.as_str()));
        }
        Ok(cases)
    }

    /// Run every case of a spec file
    pub fn run_file(&self, path: &Path) -> Result<Report, SpecError> {
        let cases = self.load(path)?;
        Ok(self.run_cases(path, &cases))
    }

    /// Run already-parsed cases, in order
    pub fn run_cases(&self, path: &Path, cases: &[TestCase]) -> Report {
        let start = Instant::now();
        let mut report = Report::new(path);
        for case in cases {
            report.push(self.runner.run(case));
        }
        report.duration = start.elapsed();
        info!(
            file = %report.file,
            passed = report.passed_count(),
            total = report.total(),
            elapsed_ms = report.duration.as_millis() as u64,
            "spec file finished"
        );
        report
    }
}

/// Builder API for convenient suite runner construction
pub struct SuiteRunnerBuilder {
    config: RunConfig,
}

impl SuiteRunnerBuilder {
    /// Start building a runner for the given shell binary
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            config: RunConfig {
                shell: shell.into(),
                ..Default::default()
            },
        }
    }

    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.config.dialect = Dialect::new(dialect);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn repo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.repo_root = root.into();
        self
    }

    /// Set the case name filter
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    /// Add an environment variable for every case
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<SuiteRunner, SpecError> {
        SuiteRunner::new(self.config)
    }
}

/// Run a spec file and integrate with `#[test]` by panicking unless all clear.
///
/// Usage in cargo tests:
/// ```rust,ignore
/// #[test]
/// fn builtins() {
///     emx_shspec::run_and_assert("spec/builtins.test.sh", RunConfig::default());
/// }
/// ```
pub fn run_and_assert(path: impl AsRef<Path>, config: RunConfig) {
    let path = path.as_ref();
    let suite = SuiteRunner::new(config).expect("failed to build suite runner");
    let report = suite.run_file(path).expect("failed to run spec file");

    for line in report.render(crate::report::DisplayMode::All, true) {
        eprintln!("{}", line);
    }

    if !report.all_clear() {
        panic!("{}", report.summary());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    fn spec_file(text: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".test.sh").tempfile().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_run_file_counts() {
        let f = spec_file(
            "#### pass\necho hi\n## stdout: hi\n\
             #### fail\necho no\n## stdout: yes\n\
             #### ni\nlocal x\n## N-I dash\n",
        );
        let suite = SuiteRunnerBuilder::new("/bin/sh").build().unwrap();
        let report = suite.run_file(f.path()).unwrap();
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.not_implemented_count(), 1);
        assert!(!report.all_clear());
    }

    #[test]
    fn test_filter_by_name() {
        let f = spec_file("#### alpha\ntrue\n#### beta\ntrue\n#### alphabet\ntrue\n");
        let suite = SuiteRunnerBuilder::new("/bin/sh").filter("alpha").build().unwrap();
        let cases = suite.load(f.path()).unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "alphabet"]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let suite = SuiteRunnerBuilder::new("/bin/sh").build().unwrap();
        let err = suite.load(Path::new("/nonexistent/none.test.sh")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.to_string().starts_with("/nonexistent/none.test.sh: "));
    }

    #[test]
    fn test_empty_dialect_rejected() {
        let err = SuiteRunnerBuilder::new("/bin/sh").dialect("").build().err().unwrap();
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.to_string().contains("dialect"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = SuiteRunnerBuilder::new("/bin/sh").timeout(Duration::ZERO).build().err().unwrap();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_idempotent_summary() {
        let f = spec_file("#### a\necho a\n## stdout: a\n#### b\nexit 1\n");
        let suite = SuiteRunnerBuilder::new("/bin/sh").build().unwrap();
        let first = suite.run_file(f.path()).unwrap().summary();
        let second = suite.run_file(f.path()).unwrap().summary();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timeout_counted_once() {
        let f = spec_file("#### spin\nwhile :; do :; done\n#### ok\ntrue\n");
        let suite = SuiteRunnerBuilder::new("/bin/sh")
            .timeout(Duration::from_millis(300))
            .build()
            .unwrap();
        let report = suite.run_file(f.path()).unwrap();
        assert_eq!(report.timeout_count(), 1);
        assert_eq!(report.passed_count(), 1);
    }
}
