use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::{RolloutRecord, StateStore, StoreError};
use crate::rollout::RolloutState;

/// On-disk shape of one rollout instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    id: String,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
    /// Operator-editable control tags
    #[serde(default)]
    tags: BTreeSet<String>,
    state: RolloutState,
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Keeps each rollout instance as a JSON document in a directory.
///
/// Operators steer an instance by editing its `tags` array.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_document(&self, path: &Path) -> Result<StateDocument, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Codec {
            id: path.display().to_string(),
            source,
        })
    }

    fn write_document(&self, document: &StateDocument) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(&document.id);
        let json = serde_json::to_string_pretty(document).map_err(|source| StoreError::Codec {
            id: document.id.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
    }

    fn load(&self, id: &str) -> Result<StateDocument, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.read_document(&path)
    }

    /// Replace the operator tags on an instance.
    pub fn set_tags<I, S>(&self, id: &str, tags: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut document = self.load(id)?;
        document.tags = tags.into_iter().map(Into::into).collect();
        self.write_document(&document)
    }

    /// Notes left on an instance, oldest first.
    pub fn notes(&self, id: &str) -> Result<Vec<Note>, StoreError> {
        Ok(self.load(id)?.notes)
    }

    /// Whether an instance is still being tracked.
    pub fn is_active(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.load(id)?.active)
    }
}

fn to_record(document: StateDocument) -> RolloutRecord {
    RolloutRecord {
        id: document.id,
        name: document.name,
        state: document.state,
        tags: document.tags,
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load_active(&self, name: &str) -> Result<Vec<RolloutRecord>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let document = self.read_document(&path)?;
            if document.active && document.name == name {
                documents.push(document);
            }
        }

        documents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        debug!(rollout = name, count = documents.len(), "loaded active rollouts");
        Ok(documents.into_iter().map(to_record).collect())
    }

    async fn create(&self, name: &str, state: RolloutState) -> Result<RolloutRecord, StoreError> {
        let id = format!("{name}-{}", Uuid::new_v4().simple());
        let document = StateDocument {
            id,
            name: name.to_string(),
            active: true,
            created_at: state.last_rollout_timestamp,
            tags: BTreeSet::new(),
            state,
            notes: Vec::new(),
        };
        self.write_document(&document)?;

        info!(rollout = name, id = %document.id, "created rollout state document");
        Ok(to_record(document))
    }

    async fn save(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        let mut document = self.load(&record.id)?;
        // Tags belong to the operator; keep whatever is on disk.
        document.state = record.state.clone();
        self.write_document(&document)
    }

    async fn notify(&self, record: &RolloutRecord, message: &str) -> Result<(), StoreError> {
        let mut document = self.load(&record.id)?;
        document.notes.push(Note {
            at: Utc::now(),
            message: message.to_string(),
        });
        self.write_document(&document)
    }

    async fn retire(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        let mut document = self.load(&record.id)?;
        document.active = false;
        self.write_document(&document)?;

        info!(rollout = %record.name, id = %record.id, "retired rollout state document");
        Ok(())
    }

    fn local_paths(&self) -> Vec<PathBuf> {
        vec![self.dir.clone()]
    }
}
