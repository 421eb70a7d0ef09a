use crate::collaborators::CommandRunner;
use crate::config::DEFAULT_COMMAND_TIMEOUT;
use crate::models::{CommandLine, CommandOutput};
use crate::{CollectError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

/// Runs commands with `tokio::process`, killing any that exceed the timeout.
#[derive(Debug, Clone, Copy)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl TokioCommandRunner {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput> {
        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollectError::CommandSpawn {
                command: command.program.clone(),
                source,
            })?;

        // Dropping the timed-out future drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            }),
            Ok(Err(source)) => Err(CollectError::CommandSpawn {
                command: command.program.clone(),
                source,
            }),
            Err(_) => Err(CollectError::CommandTimeout {
                command: command.program.clone(),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}
