//! Runner errors

use std::fmt;

/// The kind of runner error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The shell under test could not be launched
    Spawn,
    /// The shell did not finish within the configured timeout
    Timeout,
    /// IO error (temp files, spec files, pipes)
    Io,
    /// Other error
    Other,
}

/// A runner error, optionally tagged with the spec file it came from
#[derive(Debug)]
pub struct SpecError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: Option<String>,
}

impl SpecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Spawn, msg)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "timed out")
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}: ", file)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SpecError {}

impl From<std::io::Error> for SpecError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}
