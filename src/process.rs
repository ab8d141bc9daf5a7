use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::EngineError;

/// A program plus its argument vector. Never passed through a shell.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timeout: Duration,
    pub cwd: PathBuf,
}

impl RunOptions {
    pub fn new(timeout: Duration, cwd: impl AsRef<Path>) -> Self {
        Self {
            timeout,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Run `command` to completion under `options.timeout`.
///
/// A non-zero exit is only an error when the process wrote nothing to stdout;
/// otherwise both streams are returned and the caller decides what they mean.
/// On timeout the child is killed before returning.
pub async fn run(command: &ProcessCommand, options: &RunOptions) -> Result<ProcessOutput, EngineError> {
    let command_line = command.to_string();
    debug!(command = %command_line, cwd = ?options.cwd, timeout_ms = options.timeout.as_millis() as u64, "Spawning process");

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&options.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    let mut child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Internal("Failed to open stdout".to_string()))?;
    let mut child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::Internal("Failed to open stderr".to_string()))?;

    // `child` stays outside the timed future so it can still be killed on expiry.
    let completed = tokio::time::timeout(options.timeout, async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (r1, r2) = tokio::join!(
            child_stdout.read_to_end(&mut stdout_buf),
            child_stderr.read_to_end(&mut stderr_buf),
        );
        r1?;
        r2?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout_buf, stderr_buf))
    })
    .await;

    let (status, stdout_buf, stderr_buf) = match completed {
        Ok(result) => result?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(command = %command_line, "Failed to kill timed out process: {}", e);
            }
            return Err(EngineError::Timeout {
                command: command_line,
                limit: options.timeout,
            });
        }
    };

    let output = ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
        exit_code: status.code(),
    };

    if !status.success() && output.stdout.is_empty() {
        debug!(command = %command_line, exit_code = ?output.exit_code, "Process failed without output");
        return Err(EngineError::ProcessFailed {
            command: command_line,
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    debug!(command = %command_line, exit_code = ?output.exit_code, "Process completed");
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runtime::ErrorKind;
    use std::time::Instant;

    fn sh(script: &str) -> ProcessCommand {
        ProcessCommand::new("sh").arg("-c").arg(script)
    }

    fn options(timeout_ms: u64) -> RunOptions {
        RunOptions::new(Duration::from_millis(timeout_ms), std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = run(&sh("echo out; echo err >&2"), &options(5000)).await.unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_stdout_is_returned() {
        let output = run(&sh("echo partial; echo bad >&2; exit 3"), &options(5000))
            .await
            .unwrap();
        assert_eq!(output.stdout, "partial\n");
        assert_eq!(output.stderr, "bad\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stdout_fails() {
        let err = run(&sh("echo broken >&2; exit 1"), &options(5000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessError);
        match err {
            EngineError::ProcessFailed { exit_code, stderr, .. } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = run(&sh("sleep 10"), &options(200)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_binary_is_process_error() {
        let err = run(
            &ProcessCommand::new("definitely-not-a-real-binary-4821"),
            &options(1000),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
        assert_eq!(err.kind(), ErrorKind::ProcessError);
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let output = run(
            &ProcessCommand::new("cat").arg("marker.txt"),
            &RunOptions::new(Duration::from_secs(5), dir.path()),
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, "here");
    }

    #[test]
    fn test_display_joins_arguments() {
        let command = ProcessCommand::new("gcc").args(["-o", "main", "main.c"]);
        assert_eq!(command.to_string(), "gcc -o main main.c");
    }
}
