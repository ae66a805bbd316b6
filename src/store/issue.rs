use async_trait::async_trait;
use octocrab::models::issues::Issue;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::body::{decode_state, render_body};
use super::{rollout_label, RolloutRecord, StateStore, StoreError};
use crate::github::GitHubClient;
use crate::rollout::RolloutState;

/// Keeps each rollout instance in an open GitHub issue.
///
/// Issues carry the marker label plus `ring-rollout:<name>`; any other label
/// an operator adds becomes a control tag. Closing the issue retires the
/// instance.
pub struct IssueStateStore {
    client: GitHubClient,
    marker_label: String,
}

impl IssueStateStore {
    pub fn new(client: GitHubClient, marker_label: impl Into<String>) -> Self {
        Self {
            client,
            marker_label: marker_label.into(),
        }
    }

    fn issue_number(record: &RolloutRecord) -> Result<u64, StoreError> {
        record.id.parse().map_err(|_| StoreError::NotFound {
            id: record.id.clone(),
        })
    }

    fn to_record(&self, name: &str, issue: Issue) -> Option<Result<RolloutRecord, StoreError>> {
        let id = issue.number.to_string();
        let decoded = match decode_state(issue.body.as_deref().unwrap_or_default()) {
            Some(decoded) => decoded,
            None => {
                warn!(issue = issue.number, "rollout issue has no state block, skipping");
                return None;
            }
        };
        let state = match decoded {
            Ok(state) => state,
            Err(source) => return Some(Err(StoreError::Codec { id, source })),
        };

        let tags: BTreeSet<String> = issue.labels.into_iter().map(|label| label.name).collect();
        Some(Ok(RolloutRecord {
            id,
            name: name.to_string(),
            state,
            tags,
        }))
    }
}

fn codec_error(id: impl Into<String>, source: serde_json::Error) -> StoreError {
    StoreError::Codec {
        id: id.into(),
        source,
    }
}

fn short_version(version: &str) -> &str {
    match version.char_indices().nth(12) {
        Some((end, _)) => &version[..end],
        None => version,
    }
}

#[async_trait]
impl StateStore for IssueStateStore {
    async fn load_active(&self, name: &str) -> Result<Vec<RolloutRecord>, StoreError> {
        let labels = vec![self.marker_label.clone(), rollout_label(name)];
        let issues = self.client.issues().list_open_with_labels(&labels).await?;

        issues
            .into_iter()
            .filter_map(|issue| self.to_record(name, issue))
            .collect()
    }

    async fn create(&self, name: &str, state: RolloutState) -> Result<RolloutRecord, StoreError> {
        let body = render_body(name, &state).map_err(|e| codec_error(name, e))?;
        let title = format!(
            "Ring rollout: {name} @ {}",
            short_version(&state.source_version)
        );
        let labels = vec![self.marker_label.clone(), rollout_label(name)];

        let issue = self
            .client
            .issues()
            .create_issue(&title, &body, labels.clone())
            .await?;

        Ok(RolloutRecord {
            id: issue.number.to_string(),
            name: name.to_string(),
            state,
            tags: labels.into_iter().collect(),
        })
    }

    async fn save(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        let number = Self::issue_number(record)?;
        let body = render_body(&record.name, &record.state)
            .map_err(|e| codec_error(record.id.clone(), e))?;
        self.client.issues().update_body(number, &body).await?;
        Ok(())
    }

    async fn notify(&self, record: &RolloutRecord, message: &str) -> Result<(), StoreError> {
        let number = Self::issue_number(record)?;
        self.client.issues().create_comment(number, message).await?;
        Ok(())
    }

    async fn retire(&self, record: &RolloutRecord) -> Result<(), StoreError> {
        let number = Self::issue_number(record)?;
        self.client.issues().close_issue(number).await?;
        info!(rollout = %record.name, issue = number, "retired rollout issue");
        Ok(())
    }
}
