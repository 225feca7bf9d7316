//! Process execution adapter - implements ProcessRunner on tokio processes
//! Arguments are always passed as a list, never joined into a shell string

use crate::domain::entities::{ProcessExecutionRequest, ProcessResult};
use crate::domain::repositories::{ProcessError, ProcessRunner};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Runs external programs with tokio, buffered or streaming line by line
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[derive(Debug, Clone, Copy)]
enum Stream {
    Output,
    Error,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(request: &ProcessExecutionRequest) -> Command {
        let mut command = Command::new(&request.executable);
        command.args(&request.arguments);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        command
    }

    async fn run_buffered(
        &self,
        child: Child,
        request: &ProcessExecutionRequest,
    ) -> Result<ProcessResult, ProcessError> {
        let name = request.executable_name();
        let output = child.wait_with_output().await.map_err(|e| ProcessError::Io {
            executable: name.clone(),
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code();
        let success = output.status.success();

        tracing::debug!("{} exited with code {:?}", name, exit_code);

        if !success && !stderr.is_empty() {
            let code = exit_code.unwrap_or(-1);
            if request.throw_on_error {
                return Err(ProcessError::NonZeroExit {
                    executable: name,
                    code,
                    stderr,
                });
            }
            return Ok(ProcessResult {
                success: false,
                exit_code,
                output: stdout,
                error_message: Some(format!("{} failed with exit code {}: {}", name, code, stderr)),
                error_output: stderr,
            });
        }

        Ok(ProcessResult {
            success,
            exit_code,
            output: stdout,
            error_output: stderr,
            error_message: None,
        })
    }

    async fn run_streaming(
        &self,
        mut child: Child,
        request: &ProcessExecutionRequest,
    ) -> Result<ProcessResult, ProcessError> {
        let name = request.executable_name();
        let io_error = |message: String| ProcessError::Io {
            executable: name.clone(),
            message,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error("stderr was not captured".to_string()))?;

        let output_task = tokio::spawn(forward_lines(stdout, name.clone(), Stream::Output));
        let error_task = tokio::spawn(forward_lines(stderr, name.clone(), Stream::Error));

        let status = child.wait().await.map_err(|e| io_error(e.to_string()))?;
        let output_lines = output_task.await.map_err(|e| io_error(e.to_string()))?;
        let error_lines = error_task.await.map_err(|e| io_error(e.to_string()))?;

        let exit_code = status.code();
        let success = status.success();

        if success {
            tracing::info!("{} completed successfully", name);
        } else {
            tracing::error!("{} failed with exit code: {:?}", name, exit_code);
            if !error_lines.is_empty() {
                tracing::error!("Error details:");
                for line in &error_lines {
                    tracing::error!("  {}", line);
                }
            }
            if request.throw_on_error {
                return Err(ProcessError::NonZeroExit {
                    executable: name,
                    code: exit_code.unwrap_or(-1),
                    stderr: error_lines.join("\n"),
                });
            }
        }

        Ok(ProcessResult {
            success,
            exit_code,
            output: output_lines.join("\n"),
            error_output: error_lines.join("\n"),
            error_message: (!success)
                .then(|| format!("Process failed with exit code {}", exit_code.unwrap_or(-1))),
        })
    }
}

/// Forward every non-empty line to the log and collect it.
async fn forward_lines<R>(reader: R, name: String, stream: Stream) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    let mut buffer = Vec::new();

    loop {
        let segment = match segments.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("{}: stopped reading output: {}", name, e);
                break;
            }
        };
        // Tools write in the console code page; decode leniently.
        let line = String::from_utf8_lossy(&segment).trim_end_matches('\r').to_string();
        if line.is_empty() {
            continue;
        }
        match stream {
            Stream::Output => tracing::info!("{}: {}", name, line),
            Stream::Error => tracing::warn!("{}: {}", name, line),
        }
        buffer.push(line);
    }

    buffer
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn execute(&self, request: &ProcessExecutionRequest) -> Result<ProcessResult, ProcessError> {
        if !request.executable.is_file() {
            tracing::error!("Executable not found at: {}", request.executable.display());
            return Ok(ProcessResult::executable_not_found(&request.executable));
        }

        tracing::info!("Executing {}...", request.executable_name());
        tracing::debug!("Executable path: {}", request.executable.display());
        tracing::debug!("Arguments: {}", request.argument_string());

        let child = Self::command(request)
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                executable: request.executable.display().to_string(),
                source,
            })?;

        if request.real_time_logging {
            self.run_streaming(child, request).await
        } else {
            self.run_buffered(child, request).await
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Run `body` through `/bin/sh` so the freshly written file is never exec'd.
    fn script(dir: &TempDir, name: &str, body: &str) -> ProcessExecutionRequest {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("{}\n", body)).unwrap();
        ProcessExecutionRequest::new("/bin/sh").arg(path.display().to_string())
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_failed_result() {
        let runner = TokioProcessRunner::new();
        let request = ProcessExecutionRequest::new(Path::new("/nonexistent/tool.exe"));

        let result = runner.execute(&request).await.unwrap();
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("/nonexistent/tool.exe"));
    }

    #[tokio::test]
    async fn test_buffered_captures_output() {
        let dir = TempDir::new().unwrap();
        let request = script(&dir, "echoer", r#"echo "first $1"; echo "second $2""#).args(["a b", "c"]);

        let result = TokioProcessRunner::new().execute(&request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output, "first a b\nsecond c");
    }

    #[tokio::test]
    async fn test_buffered_failure_with_stderr() {
        let dir = TempDir::new().unwrap();
        let request = script(&dir, "failing", "echo broken >&2; exit 3");

        let result = TokioProcessRunner::new().execute(&request).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.error_output, "broken");
        assert_eq!(
            result.error_message.as_deref(),
            Some("sh failed with exit code 3: broken")
        );

        let err = TokioProcessRunner::new()
            .execute(&request.clone().throw_on_error())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_buffered_failure_without_stderr_does_not_throw() {
        let dir = TempDir::new().unwrap();
        let request = script(&dir, "quiet", "exit 1").throw_on_error();

        let result = TokioProcessRunner::new().execute(&request).await.unwrap();
        assert!(!result.success);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_streaming_collects_both_streams() {
        let dir = TempDir::new().unwrap();
        let request = script(&dir, "chatty", "echo one; echo; echo warn >&2; echo two").streaming();

        let result = TokioProcessRunner::new().execute(&request).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "one\ntwo");
        assert_eq!(result.error_output, "warn");
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_streaming_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let request = script(&dir, "bad", "echo nope >&2; exit 2").streaming();

        let result = TokioProcessRunner::new().execute(&request).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(
            result.error_message.as_deref(),
            Some("Process failed with exit code 2")
        );
    }
}
