//! Persistence of rollout instances.
//!
//! The controller never sees how state is encoded; it loads records, hands
//! their state to the engine and saves whatever comes back. Tags travel with
//! each record so operators can steer a rollout (pause, abort, fastlane)
//! through whatever surface the store exposes.

pub mod body;
pub mod file;
pub mod issue;

pub use file::FileStateStore;
pub use issue::IssueStateStore;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::github::GitHubError;
use crate::rollout::RolloutState;

/// One rollout instance as held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutRecord {
    /// Store-assigned identifier (issue number, document name)
    pub id: String,
    /// Ring set this instance rolls out
    pub name: String,
    pub state: RolloutState,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("Failed to access state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed rollout state in {id}: {source}")]
    Codec {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Rollout instance {id} not found")]
    NotFound { id: String },
}

/// Load/save seam between the controller and wherever rollout state lives.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Active (not retired) instances of the named ring set, oldest first.
    async fn load_active(&self, name: &str) -> Result<Vec<RolloutRecord>, StoreError>;

    async fn create(&self, name: &str, state: RolloutState) -> Result<RolloutRecord, StoreError>;

    async fn save(&self, record: &RolloutRecord) -> Result<(), StoreError>;

    /// Leave a human-readable note on the instance.
    async fn notify(&self, record: &RolloutRecord, message: &str) -> Result<(), StoreError>;

    /// Stop tracking a finished or superseded instance.
    async fn retire(&self, record: &RolloutRecord) -> Result<(), StoreError>;

    /// Local directories the store writes to. These never belong in a ring
    /// snapshot.
    fn local_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Box<T> {
    async fn load_active(&self, name: &str) -> Result<Vec<RolloutRecord>, StoreError> {
        (**self).load_active(name).await
    }

    async fn create(&self, name: &str, state: RolloutState) -> Result<RolloutRecord, StoreError> {
        (**self).create(name, state).await
    }

    async fn save(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }

    async fn notify(&self, record: &RolloutRecord, message: &str) -> Result<(), StoreError> {
        (**self).notify(record, message).await
    }

    async fn retire(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        (**self).retire(record).await
    }

    fn local_paths(&self) -> Vec<PathBuf> {
        (**self).local_paths()
    }
}

/// Label that ties a record to its ring set.
pub fn rollout_label(name: &str) -> String {
    format!("ring-rollout:{name}")
}
