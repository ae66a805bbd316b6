//! Validation gate
//!
//! Runs the operator-configured validation command before a ring is
//! promoted. The gate only reports; the engine decides what a failure means
//! for the rollout.

use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

use crate::rollout::RolloutError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub success: bool,
    pub output: String,
}

impl ValidationResult {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Something that can run a validation command to completion.
#[cfg_attr(test, automock)]
pub trait ValidationGate {
    fn run(&self, command: &str) -> Result<ValidationResult, RolloutError>;
}

/// Runs validation commands through the platform shell.
///
/// No timeout is applied: a hanging command hangs the tick.
#[derive(Debug, Clone, Default)]
pub struct ShellValidationGate {
    working_dir: Option<PathBuf>,
}

impl ShellValidationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
        }
    }

    fn shell_command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

impl ValidationGate for ShellValidationGate {
    fn run(&self, command: &str) -> Result<ValidationResult, RolloutError> {
        let mut cmd = Self::shell_command(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %command, "running validation command");
        let output = cmd.output().map_err(|source| RolloutError::ValidationSpawn {
            command: command.to_string(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let success = output.status.code() == Some(0);
        info!(
            command = %command,
            exit_code = ?output.status.code(),
            success,
            "validation command finished"
        );

        Ok(ValidationResult {
            success,
            output: combined,
        })
    }
}
