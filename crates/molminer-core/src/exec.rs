use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("binary not found: {0}")]
    NotFound(String),
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Captured output from an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Turn a non-zero exit into an error, keeping stderr for the message.
    pub fn ensure_success(self, program: &str) -> ExecResult<Self> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ExecError::Failed {
                program: program.to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Resolve a binary on PATH (or verify an explicit path exists).
///
/// Wrappers call this up front so a misconfigured path fails the whole
/// invocation instead of every processing unit.
pub fn resolve_binary(program: &str) -> ExecResult<PathBuf> {
    which::which(program).map_err(|_| ExecError::NotFound(program.to_string()))
}

/// Run an external command and capture stdout/stderr.
pub async fn run<S, I, A>(program: S, args: I) -> ExecResult<CommandOutput>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let output = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| spawn_error(&program, e))?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run an external command, feeding `input` on its stdin.
pub async fn run_with_stdin<S, I, A>(program: S, args: I, input: &str) -> ExecResult<CommandOutput>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let mut child = Command::new(&program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(&program, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await?;
        stdin.shutdown().await?;
    }

    let output = child.wait_with_output().await?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn spawn_error<S: AsRef<OsStr>>(program: &S, err: std::io::Error) -> ExecError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExecError::NotFound(program.as_ref().to_string_lossy().to_string())
    } else {
        ExecError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout() {
        let output = run("echo", ["hello"]).await.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn run_with_stdin_pipes_input() {
        let output = run_with_stdin("cat", Vec::<&str>::new(), "piped\n")
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "piped\n");
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let result = run("definitely-not-a-real-binary-xyz", ["--version"]).await;
        assert!(matches!(result, Err(ExecError::NotFound(_))));
    }

    #[test]
    fn resolve_known_binary() {
        assert!(resolve_binary("sh").is_ok());
        assert!(matches!(
            resolve_binary("definitely-not-a-real-binary-xyz"),
            Err(ExecError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ensure_success_surfaces_stderr() {
        let output = run("sh", ["-c", "echo oops >&2; exit 3"]).await.unwrap();
        let err = output.ensure_success("sh").unwrap_err();
        assert!(err.to_string().contains("oops"));
    }
}
