use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a rollout invocation.
///
/// Validation failures and version-marker mismatches are not listed here:
/// the engine turns those into state (retry counters, abort reasons) rather
/// than failing the run.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("Invalid duration '{input}': unknown unit '{unit}'")]
    UnknownDurationUnit { input: String, unit: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn validation command '{command}': {source}")]
    ValidationSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Publish rejected after {attempts} attempt(s): {reason}")]
    PublishConflict { attempts: u32, reason: String },

    #[error("Rebase onto {remote}/{branch} hit conflicts; ring directories were changed by another run")]
    RebaseConflict { remote: String, branch: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("State store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl RolloutError {
    pub fn config(message: impl Into<String>) -> Self {
        RolloutError::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RolloutError::Io {
            path: path.into(),
            source,
        }
    }

    /// Configuration problems are reported before anything is mutated.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RolloutError::UnknownDurationUnit { .. } | RolloutError::Config { .. }
        )
    }
}
