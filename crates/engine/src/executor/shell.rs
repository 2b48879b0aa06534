use std::process::Stdio;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{context::ActionContext, model::ShellAction};

/// Runs a shell action.
///
/// The walker itself never spawns processes; it hands every shell action to
/// the runner configured on the engine. The default runner only describes the
/// command, which keeps execute free of process side effects in tests and
/// previews.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, shell: &ShellAction, context: &ActionContext) -> anyhow::Result<Value>;
}

/// Logs the command and returns it without running anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescribeShellRunner;

#[async_trait]
impl ShellRunner for DescribeShellRunner {
    async fn run(&self, shell: &ShellAction, _context: &ActionContext) -> anyhow::Result<Value> {
        info!(command = %shell.command, description = %shell.description, "shell command (not spawned)");
        Ok(json!({ "command": shell.command }))
    }
}

/// Spawns the command through the platform shell and captures its output.
///
/// The working directory is the action's `cwd`, else the context project
/// path, else the current directory. A non-zero exit status is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessShellRunner;

#[async_trait]
impl ShellRunner for ProcessShellRunner {
    async fn run(&self, shell: &ShellAction, context: &ActionContext) -> anyhow::Result<Value> {
        let mut command = platform_command(&shell.command);
        if let Some(cwd) = shell.cwd.as_deref().or(context.project_path()) {
            command.current_dir(cwd);
        }
        debug!(command = %shell.command, cwd = ?shell.cwd, "spawning shell command");

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to spawn '{}'", shell.command))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            bail!("exited with {}: {}", output.status, stderr.trim());
        }
        info!(command = %shell.command, "shell command finished");
        Ok(json!({
            "command": shell.command,
            "status": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
        }))
    }
}

#[cfg(windows)]
fn platform_command(command: &str) -> Command {
    let mut process = Command::new("cmd");
    process.arg("/C").arg(command);
    process
}

#[cfg(not(windows))]
fn platform_command(command: &str) -> Command {
    let mut process = Command::new("sh");
    process.arg("-c").arg(command);
    process
}
