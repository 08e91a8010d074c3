use crate::models::{Host, DEFAULT_SSH_PORT};
use anyhow::{Context, Result};
use std::future::Future;
use std::pin::Pin;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Per-host limit for non-interactive commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one remote command. Output is kept even when the command failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub output: String,
    pub error: Option<String>,
}

/// Runs one command on one host without a terminal.
pub trait CommandRunner: Send + Sync {
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        user_override: Option<&'a str>,
    ) -> BoxFuture<'a, ExecOutcome>;
}

/// Login name of whoever runs this process.
pub fn current_user() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Override first, then the host's own user, then the operator.
pub fn resolve_user(host: &Host, user_override: Option<&str>) -> Option<String> {
    user_override
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| host.user.clone().filter(|u| !u.is_empty()))
        .or_else(current_user)
}

fn ssh_args(host: &Host, user_override: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if host.port() != DEFAULT_SSH_PORT {
        args.push("-p".to_string());
        args.push(host.port().to_string());
    }
    let target = match resolve_user(host, user_override) {
        Some(user) => format!("{}@{}", user, host.hostname),
        None => host.hostname.clone(),
    };
    args.push(target);
    args
}

/// Hand the terminal to an interactive `ssh` session and wait for it to end.
pub fn connect(host: &Host, user_override: Option<&str>) -> Result<()> {
    let args = ssh_args(host, user_override);
    tracing::info!("Attempting to connect: ssh {}", args.join(" "));

    let status = Command::new("ssh")
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute SSH command for {}", host.name))?;

    if !status.success() {
        tracing::error!("SSH command finished with a non-zero status: {}", status);
        anyhow::bail!("ssh connection to {} failed: {}", host.name, status);
    }
    Ok(())
}

/// Runs commands through the `ssh` binary in batch mode.
#[derive(Debug, Clone)]
pub struct SshRunner {
    timeout: Duration,
}

impl Default for SshRunner {
    fn default() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }
}

impl SshRunner {
    async fn run(&self, host: &Host, command: &str, user_override: Option<&str>) -> ExecOutcome {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ];
        args.extend(ssh_args(host, user_override));
        args.push(command.to_string());

        let child = tokio::process::Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                return ExecOutcome {
                    output: String::new(),
                    error: Some(format!("timed out after {}s", self.timeout.as_secs())),
                }
            }
            Ok(Err(e)) => {
                return ExecOutcome {
                    output: String::new(),
                    error: Some(format!("failed to run ssh: {e}")),
                }
            }
            Ok(Ok(output)) => output,
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            text.push_str("\nSTDERR:\n");
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        let error = (!output.status.success()).then(|| format!("ssh command failed: {}", output.status));
        ExecOutcome { output: text, error }
    }
}

impl CommandRunner for SshRunner {
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        user_override: Option<&'a str>,
    ) -> BoxFuture<'a, ExecOutcome> {
        Box::pin(self.run(host, command, user_override))
    }
}
