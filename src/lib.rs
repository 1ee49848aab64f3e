//! emx-shspec: a conformance test runner for shells
//!
//! # Overview
//!
//! Spec files hold shell snippets annotated with their expected stdout and
//! exit status. Each snippet is written to a temp file, run as
//! `<shell> <script>` with a timeout, and classified against its expectations.
//!
//! # Spec File Syntax
//!
//! ```text
//! #### echo with two args
//! echo hello world
//! ## stdout: hello world
//!
//! #### multi-line output
//! echo a; echo b
//! ## STDOUT:
//! a
//! b
//! ## END
//! ## BUG mksh STDOUT:
//! a
//! ## END
//!
//! #### exit status
//! exit 3
//! ## status: 3
//! ## N-I dash status: 2
//! ```
//!
//! # Annotations
//!
//! | Annotation | Meaning |
//! |------------|---------|
//! | `## STDOUT:` ... `## END` | Expected stdout block (first value wins) |
//! | `## stdout: X` | Expected stdout `X\n` (first value wins) |
//! | `## stdout-json: "..."` | Expected stdout as a JSON string (fallback) |
//! | `## status: N` | Expected exit status (last value wins) |
//! | `## code: X` | Replace the script with `X\n` |
//! | `## OK <shell> ...` / `## BUG <shell> ...` | Override for the dialect under test |
//! | `## N-I <shell> ...` | Not implemented by the dialect under test |
//!
//! # Outcomes
//!
//! `PASS`, `FAIL`, `N-I`, `ERROR` (shell could not be launched) and `TIMEOUT`.
//! A file is all clear when it has no `FAIL`, `ERROR` or `TIMEOUT`.

mod case;
mod dialect;
mod error;
mod parser;
mod report;
mod runner;
mod suite;

pub use case::{TestCase, Outcome, CaseResult};
pub use dialect::{Dialect, DEFAULT_DIALECT};
pub use error::{SpecError, ErrorKind};
pub use parser::SpecParser;
pub use report::{Report, DisplayMode};
pub use runner::{CaseRunner, RunConfig, ExecOutput, locate_repo_root};
pub use runner::{DEFAULT_SHELL, DEFAULT_TIMEOUT, HELPER_BIN_DIR, SHELL_ENV};
pub use suite::{SuiteRunner, SuiteRunnerBuilder};

// Convenience function for cargo test integration
pub use suite::run_and_assert;
