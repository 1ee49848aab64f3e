//! Case runner
//!
//! Runs one [`TestCase`] against the shell under test: writes the script to a
//! temp file, spawns `<shell> <script>` with a bounded wait, and classifies the
//! captured stdout and exit status against the case's expectations.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use similar::TextDiff;
use tracing::{debug, warn};

use crate::case::{CaseResult, Outcome, TestCase};
use crate::dialect::Dialect;
use crate::error::SpecError;

/// Shell used when neither `--shell` nor `TEST_SHELL` is given
pub const DEFAULT_SHELL: &str = "./zig-out/bin/zigsh";

/// Environment variable overriding the shell path
pub const SHELL_ENV: &str = "TEST_SHELL";

/// Per-case wall-clock limit
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Helper binaries prepended to the child's PATH, relative to the repo root
pub const HELPER_BIN_DIR: &str = "oil/spec/bin";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the case runner
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Shell binary under test
    pub shell: PathBuf,
    /// Dialect whose annotations are honored
    pub dialect: Dialect,
    /// Per-case timeout
    pub timeout: Duration,
    /// Repository root, exported as `REPO_ROOT` and used to find helper binaries
    pub repo_root: PathBuf,
    /// Extra environment variables for every case
    pub env: Vec<(String, String)>,
    /// Only run cases whose name contains this string
    pub filter: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            shell: std::env::var_os(SHELL_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
            dialect: Dialect::default(),
            timeout: DEFAULT_TIMEOUT,
            repo_root: locate_repo_root(),
            env: Vec::new(),
            filter: None,
        }
    }
}

/// Find the repository root: the nearest ancestor of the running executable
/// that contains `oil/spec`, else the current directory.
pub fn locate_repo_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            exe.ancestors()
                .skip(1)
                .find(|dir| dir.join("oil").join("spec").is_dir())
                .map(Path::to_path_buf)
        })
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Captured result of one shell invocation
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or `-signal` when the shell was killed by a signal
    pub status: i32,
}

/// Runs cases one at a time against the configured shell
pub struct CaseRunner {
    config: RunConfig,
}

impl CaseRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run a single case and classify its outcome
    pub fn run(&self, case: &TestCase) -> CaseResult {
        let start = Instant::now();

        let mut result = if case.not_implemented {
            CaseResult::new(
                &case.name,
                Outcome::NotImplemented,
                format!("not implemented in {}", self.config.dialect),
            )
        } else {
            match self.execute(&case.code) {
                Ok(output) => compare(case, &output),
                Err(e) if e.is_timeout() => {
                    warn!(case = %case.name, timeout = ?self.config.timeout, "case timed out");
                    CaseResult::new(&case.name, Outcome::Timeout, e.message)
                }
                Err(e) => {
                    warn!(case = %case.name, error = %e, "failed to run case");
                    CaseResult::new(&case.name, Outcome::Error, e.message)
                }
            }
        };

        result.duration = start.elapsed();
        debug!(
            case = %case.name,
            line = case.line,
            outcome = %result.outcome,
            elapsed_ms = result.duration.as_millis() as u64,
            "case finished"
        );
        result
    }

    /// Execute a script with the shell under test.
    ///
    /// The script file and the per-case `TMP` directory are removed when this
    /// returns, on every path. The shell runs in its own process group; on
    /// timeout the whole group is killed and the shell is reaped.
    pub fn execute(&self, code: &str) -> Result<ExecOutput, SpecError> {
        let script = write_script(code)?;
        let tmp = tempfile::Builder::new().prefix("shspec-tmp-").tempdir()?;

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg(script.path());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (k, v) in self.environ(tmp.path()) {
            cmd.env(k, v);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            SpecError::spawn(format!("failed to execute '{}': {}", self.config.shell.display(), e))
        })?;

        let deadline = Instant::now() + self.config.timeout;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_until(&mut child, deadline) {
            Ok(status) => status,
            Err(e) => {
                terminate(&mut child);
                return Err(e);
            }
        };
        // A background job may outlive the shell and keep the pipes open
        let collected = collect(&stdout, deadline)
            .and_then(|out| collect(&stderr, deadline).map(|err| (out, err)));
        let (stdout, stderr) = match collected {
            Ok(pair) => pair,
            Err(e) => {
                terminate(&mut child);
                return Err(e);
            }
        };

        if !stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&stderr), "shell stderr");
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            status: exit_code(status),
        })
    }

    /// Variables added to the inherited environment of the child
    fn environ(&self, tmp: &Path) -> Vec<(OsString, OsString)> {
        let mut env: Vec<(OsString, OsString)> =
            self.config.env.iter().map(|(k, v)| (k.into(), v.into())).collect();

        let inherited = std::env::var_os("PATH").unwrap_or_else(|| OsString::from("/usr/bin:/bin"));
        let mut path = self.config.repo_root.join(HELPER_BIN_DIR).into_os_string();
        path.push(":");
        path.push(inherited);

        env.push(("PATH".into(), path));
        env.push(("SH".into(), absolute(&self.config.shell).into_os_string()));
        env.push(("TMP".into(), tmp.as_os_str().to_os_string()));
        env.push(("REPO_ROOT".into(), absolute(&self.config.repo_root).into_os_string()));
        env
    }
}

/// Compare captured output against the case's expectations
fn compare(case: &TestCase, output: &ExecOutput) -> CaseResult {
    let mut errors = Vec::new();
    let mut diff = None;

    if let Some(ref expected) = case.expected_stdout {
        if *expected != output.stdout {
            errors.push(format!("stdout: expected {:?}, got {:?}", expected, output.stdout));
            diff = Some(
                TextDiff::from_lines(expected, &output.stdout)
                    .unified_diff()
                    .header("expected", "actual")
                    .to_string(),
            );
        }
    }
    if output.status != case.expected_status {
        errors.push(format!("status: expected {}, got {}", case.expected_status, output.status));
    }

    if errors.is_empty() {
        CaseResult::new(&case.name, Outcome::Pass, "")
    } else {
        let mut result = CaseResult::new(&case.name, Outcome::Fail, errors.join("; "));
        result.diff = diff;
        result
    }
}

fn write_script(code: &str) -> Result<tempfile::NamedTempFile, SpecError> {
    let mut file = tempfile::Builder::new()
        .prefix("shspec-")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(file)
}

/// Read a pipe to EOF on a helper thread
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

/// Wait for a drained pipe. A pipe still held open past the deadline (e.g. by
/// a background grandchild) counts as a timeout.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Result<Vec<u8>, SpecError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(buf) => Ok(buf),
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
        Err(RecvTimeoutError::Timeout) => Err(SpecError::timeout()),
    }
}

/// Poll the child until it exits or the deadline passes
fn wait_until(child: &mut Child, deadline: Instant) -> Result<ExitStatus, SpecError> {
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None if Instant::now() >= deadline => return Err(SpecError::timeout()),
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Kill the shell's process group (the shell and every job it started), then
/// reap the shell. Safe to call after the shell has already been reaped.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            debug!(pgid = child.id(), error = %e, "failed to kill process group");
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
