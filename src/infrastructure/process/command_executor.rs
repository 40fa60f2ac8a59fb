use crate::common::error::RepoError;
use crate::common::result::RepoResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use url::Url;

/// Configuration for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Working directory for command execution
    pub working_directory: Option<PathBuf>,

    /// Environment variables to set for the process
    pub environment_variables: HashMap<String, String>,

    /// Deadline for the whole invocation
    pub timeout: Option<Duration>,
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_environment_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: exit_code == 0,
        }
    }
}

/// Runs backend tools (`git`, `svn`) as child processes.
///
/// Children are spawned with `kill_on_drop`, so a timeout or a cancelled
/// caller never leaves a process running.
pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute `program` with `args`, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error here; callers classify the output.
    pub async fn execute(
        program: &str,
        args: &[String],
        config: &ExecutionConfig,
    ) -> RepoResult<ExecutionResult> {
        let start_time = Instant::now();
        let rendered = display_command(program, args);
        tracing::debug!(command = %rendered, "executing");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("LC_ALL", "C")
            .kill_on_drop(true);

        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }
        for (key, value) in &config.environment_variables {
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let output = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, output_future).await {
                Ok(output) => output,
                Err(_) => {
                    tracing::warn!(command = %rendered, "killed after {}s timeout", timeout.as_secs());
                    return Err(RepoError::timed_out(timeout.as_secs()));
                }
            },
            None => output_future.await,
        }
        .map_err(|e| RepoError::command_failed(rendered.clone(), -1, e.to_string()))?;

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(
            command = %rendered,
            exit_code,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "finished"
        );
        Ok(ExecutionResult::new(
            exit_code,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Render a command line for logs and error messages with secrets masked.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    let mut mask_next = false;

    for arg in args {
        if mask_next {
            parts.push("****".to_string());
            mask_next = false;
            continue;
        }
        if arg == "--password" {
            mask_next = true;
        }
        parts.push(mask_url_password(arg));
    }

    parts.join(" ")
}

fn mask_url_password(arg: &str) -> String {
    if !arg.contains("://") {
        return arg.to_string();
    }
    match Url::parse(arg) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        _ => arg.to_string(),
    }
}
