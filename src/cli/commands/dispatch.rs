//! GitHub Actions entry point.
//!
//! A single workflow runs `ring-rollout dispatch` on `push`, `schedule` and
//! `issues` events; the event name decides whether a new rollout starts or
//! the active ones are ticked.

use anyhow::{anyhow, Result};
use std::path::Path;

use super::start::StartCommand;
use super::tick::TickCommand;
use super::RolloutContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Start { version: String },
    Tick,
    Ignore { reason: String },
}

impl Trigger {
    /// Map an Actions event to the work it should cause.
    pub fn from_event(event: &str, sha: Option<&str>, action: Option<&str>) -> Result<Self> {
        match event {
            "push" => {
                let version = sha
                    .filter(|sha| !sha.is_empty())
                    .ok_or_else(|| anyhow!("push event without GITHUB_SHA"))?;
                Ok(Trigger::Start {
                    version: version.to_string(),
                })
            }
            "schedule" | "workflow_dispatch" => Ok(Trigger::Tick),
            // Label edits are how operators steer a rollout; act on them promptly.
            "issues" => match action {
                Some("labeled") | Some("unlabeled") | None => Ok(Trigger::Tick),
                Some(other) => Ok(Trigger::Ignore {
                    reason: format!("issues event action '{other}' does not affect rollouts"),
                }),
            },
            other => Ok(Trigger::Ignore {
                reason: format!("event '{other}' is not handled by ring-rollout"),
            }),
        }
    }
}

/// `action` field of the webhook payload Actions writes to disk.
fn payload_action(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let payload: serde_json::Value = serde_json::from_str(&content).ok()?;
    payload.get("action")?.as_str().map(str::to_string)
}

pub struct DispatchCommand;

impl DispatchCommand {
    pub async fn execute(&self, context: &RolloutContext) -> Result<()> {
        let event = std::env::var("GITHUB_EVENT_NAME")
            .map_err(|_| anyhow!("GITHUB_EVENT_NAME is not set; dispatch runs inside GitHub Actions"))?;
        let sha = std::env::var("GITHUB_SHA").ok();
        let action = std::env::var("GITHUB_EVENT_PATH")
            .ok()
            .and_then(|path| payload_action(Path::new(&path)));

        match Trigger::from_event(&event, sha.as_deref(), action.as_deref())? {
            Trigger::Start { version } => StartCommand::new(version).execute(context).await,
            Trigger::Tick => TickCommand.execute(context).await,
            Trigger::Ignore { reason } => {
                tracing::warn!(event = %event, "{reason}");
                println!("⚠️  {reason}");
                Ok(())
            }
        }
    }
}
