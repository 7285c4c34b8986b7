//! Builder for executing external tool commands with timeout support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines kept when stderr is streamed.
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). When stderr is streamed this
    /// holds only the trailing lines.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use hf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> hf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-of").arg("json")
///     .arg("-show_streams")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and fail on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// - Returns [`hf_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`hf_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`hf_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> hf_core::Result<ToolOutput> {
        let output = self.output().await?;
        check_status(&self.program_name(), output)
    }

    /// Execute the command and return its output whatever the exit status.
    ///
    /// Only spawn failures, I/O failures and timeouts are errors.
    pub async fn output(&self) -> hf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            hf_core::Error::tool(&program_name, format!("failed to spawn: {e}"))
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ToolOutput {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(hf_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(hf_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Execute the command, handing each stderr line to `on_line` as it
    /// arrives. Fails on a non-zero exit status; the error message carries
    /// the trailing stderr lines.
    ///
    /// On timeout the child is killed before the error is returned.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
    ) -> hf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            hf_core::Error::tool(&program_name, format!("failed to spawn: {e}"))
        })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            hf_core::Error::tool(&program_name, "stderr was not captured")
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            hf_core::Error::tool(&program_name, "stdout was not captured")
        })?;

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let work = async {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                on_line(&line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            child.wait().await
        };

        let waited = tokio::time::timeout(self.timeout, work).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(hf_core::Error::tool(
                    program_name,
                    format!("I/O error waiting for process: {e}"),
                ));
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out {program_name}: {e}");
                }
                stdout_task.abort();
                return Err(hf_core::Error::tool(
                    program_name,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let output = ToolOutput {
            status,
            stdout,
            stderr: tail.into_iter().collect::<Vec<_>>().join("\n"),
        };
        check_status(&program_name, output)
    }
}

fn check_status(program_name: &str, output: ToolOutput) -> hf_core::Result<ToolOutput> {
    if output.status.success() {
        return Ok(output);
    }
    Err(hf_core::Error::tool(
        program_name,
        format!(
            "exited with status {}: {}",
            output.status,
            output.stderr.trim()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("failed to spawn"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_returns_non_zero_status() {
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo partial; exit 3"])
            .output()
            .await
            .unwrap();
        assert!(!out.status.success());
        assert_eq!(out.stdout.trim(), "partial");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_reports_stderr_on_failure() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken codec >&2; exit 1"])
            .execute()
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("broken codec"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_callback_sees_every_line() {
        let mut seen = Vec::new();
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo out_time_us=1000000 >&2; echo progress=end >&2"])
            .execute_with_stderr_callback(|line| seen.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["out_time_us=1000000", "progress=end"]);
        assert!(out.stderr.contains("progress=end"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_callback_timeout_kills_child() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo started >&2; sleep 10"])
            .timeout(Duration::from_millis(200))
            .execute_with_stderr_callback(|_| {})
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_callback_failure_keeps_tail() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo Unknown encoder >&2; exit 1"])
            .execute_with_stderr_callback(|_| {})
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unknown encoder"), "unexpected error: {err}");
    }
}
