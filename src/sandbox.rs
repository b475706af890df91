//! Sandboxed execution of generated code.
//!
//! The code is written into a per-run scratch directory and run as a child
//! process under a hard wall-clock timeout, with the scratch directory as
//! its working directory. The directory is owned by a [`tempfile::TempDir`],
//! so the script and anything it wrote are removed when the scope exits on
//! every path: normal completion, timeout, or an internal error. On success,
//! the model and data files the generated code is told to leave behind are
//! captured into the outcome first.
//!
//! Success is two-layered: a clean exit status is not enough, because the
//! amplpy runtime reports solver-level failures (infeasible, unbounded,
//! missing values) on exit code 0. The combined output must also be free of
//! the in-band error markers.

use crate::util::{run_with_timeout, tail_chars, truncate};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Files the generated code is instructed to write into its working
/// directory alongside the console output.
pub const MODEL_FILE: &str = "model.mod";
pub const DATA_FILE: &str = "data.dat";

/// Phrases that mark a logical failure even when the process exits 0.
const ERROR_MARKERS: &[&str] = &[
    "syntax error",
    "no value for",
    "error executing",
    "infeasible",
    "unbounded",
    "undefined",
];

const FAILURE_DETAIL_MAX_CHARS: usize = 4_000;

/// Normalized result of one sandboxed execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure: Option<String>,
    /// Contents of `model.mod`, captured on success when the run wrote it.
    pub model: Option<String>,
    /// Contents of `data.dat`, captured on success when the run wrote it.
    pub data: Option<String>,
}

/// Execution boundary consumed by the orchestrator.
pub trait CodeRunner {
    fn run(&self, code: &str) -> ExecOutcome;
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    interpreter: String,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl Sandbox {
    pub fn new(timeout: Duration) -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_interpreter(mut self, program: impl Into<String>) -> Self {
        self.interpreter = program.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn try_run(&self, code: &str) -> Result<ExecOutcome, String> {
        let workdir = tempfile::Builder::new()
            .prefix("optiforge-")
            .tempdir_in(&self.scratch_dir)
            .map_err(|e| format!("failed to create scratch directory: {}", e))?;
        let script = workdir.path().join("main.py");
        fs::write(&script, code).map_err(|e| format!("failed to write scratch file: {}", e))?;

        let mut command = Command::new(&self.interpreter);
        command.arg(&script).current_dir(workdir.path());
        let result = run_with_timeout(&mut command, self.timeout)?;

        if result.timed_out {
            return Ok(ExecOutcome {
                success: false,
                stdout: result.stdout,
                stderr: result.stderr,
                failure: Some(format!(
                    "timeout: execution exceeded {} seconds",
                    self.timeout.as_secs()
                )),
                model: None,
                data: None,
            });
        }

        let exited_clean = result.status.map(|s| s.success()).unwrap_or(false);
        let combined = format!("{}\n{}", result.stdout, result.stderr).to_lowercase();
        let marker = ERROR_MARKERS.iter().find(|m| combined.contains(**m));

        let failure = if exited_clean && marker.is_none() {
            None
        } else if !exited_clean {
            let detail = if result.stderr.trim().is_empty() {
                format!(
                    "process exited with code {}",
                    result
                        .status
                        .and_then(|s| s.code())
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                )
            } else {
                // Keep the tail: interpreter tracebacks end with the error.
                tail_chars(&result.stderr, FAILURE_DETAIL_MAX_CHARS)
            };
            Some(detail)
        } else {
            // Clean exit with an in-band marker: report the matched output.
            Some(format!(
                "solver error marker '{}' in output: {}",
                marker.unwrap_or(&""),
                truncate(combined.trim(), FAILURE_DETAIL_MAX_CHARS)
            ))
        };

        let (model, data) = if failure.is_none() {
            let read_artifact = |name: &str| fs::read_to_string(workdir.path().join(name)).ok();
            (read_artifact(MODEL_FILE), read_artifact(DATA_FILE))
        } else {
            (None, None)
        };

        Ok(ExecOutcome {
            success: failure.is_none(),
            stdout: result.stdout,
            stderr: result.stderr,
            failure,
            model,
            data,
        })
    }
}

impl CodeRunner for Sandbox {
    /// Hard guarantee: never panics and never surfaces an error. Internal
    /// faults (scratch file I/O, spawn failure) become failure outcomes.
    fn run(&self, code: &str) -> ExecOutcome {
        self.try_run(code).unwrap_or_else(|err| ExecOutcome {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(err),
            model: None,
            data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // `sh` stands in for the Python interpreter so the tests exercise the
    // process plumbing without depending on a python3 install.
    fn shell_sandbox(timeout: Duration) -> (Sandbox, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(timeout)
            .with_interpreter("sh")
            .with_scratch_dir(dir.path());
        (sandbox, dir)
    }

    fn scratch_is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[test]
    fn clean_run_succeeds() {
        let (sandbox, dir) = shell_sandbox(Duration::from_secs(5));
        let outcome = sandbox.run("echo objective value 42");
        assert!(outcome.success);
        assert!(outcome.stdout.contains("objective value 42"));
        assert!(outcome.failure.is_none());
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn nonzero_exit_reports_stderr() {
        let (sandbox, dir) = shell_sandbox(Duration::from_secs(5));
        let outcome = sandbox.run("echo boom >&2; exit 3");
        assert!(!outcome.success);
        assert!(outcome.failure.unwrap().contains("boom"));
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn in_band_marker_fails_despite_clean_exit() {
        let (sandbox, dir) = shell_sandbox(Duration::from_secs(5));
        let outcome = sandbox.run("echo 'presolve: problem is Infeasible'; exit 0");
        assert!(!outcome.success);
        let failure = outcome.failure.unwrap();
        assert!(failure.contains("infeasible"));
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn model_and_data_files_are_captured_on_success() {
        let (sandbox, dir) = shell_sandbox(Duration::from_secs(5));
        let outcome =
            sandbox.run("echo 'set A;' > model.mod\necho 'param c := 3;' > data.dat\necho done");
        assert!(outcome.success);
        assert_eq!(outcome.model.as_deref(), Some("set A;\n"));
        assert_eq!(outcome.data.as_deref(), Some("param c := 3;\n"));
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn model_file_ignored_on_failure() {
        let (sandbox, dir) = shell_sandbox(Duration::from_secs(5));
        let outcome = sandbox.run("echo 'set A;' > model.mod\nexit 1");
        assert!(!outcome.success);
        assert!(outcome.model.is_none());
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn marker_scan_covers_stderr() {
        let (sandbox, _dir) = shell_sandbox(Duration::from_secs(5));
        let outcome = sandbox.run("echo 'Error executing solve' >&2; exit 0");
        assert!(!outcome.success);
    }

    #[test]
    fn timeout_kills_and_cleans_up() {
        let (sandbox, dir) = shell_sandbox(Duration::from_millis(200));
        let start = Instant::now();
        let outcome = sandbox.run("exec sleep 5");
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!outcome.success);
        assert!(outcome.failure.unwrap().contains("timeout"));
        assert!(scratch_is_empty(&dir));
    }

    #[test]
    fn spawn_failure_becomes_failure_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(Duration::from_secs(1))
            .with_interpreter("optiforge-no-such-interpreter")
            .with_scratch_dir(dir.path());
        let outcome = sandbox.run("echo hi");
        assert!(!outcome.success);
        assert!(outcome.failure.is_some());
        assert!(scratch_is_empty(&dir));
    }
}
