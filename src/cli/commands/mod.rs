use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ring_rollout::{
    FileStateStore, Git2Publisher, GitHubClient, IssueStateStore, PublishReport, RolloutController,
    RolloutSettings, ShellValidationGate, StateStore, StoreKind, TickReport, WriteBackTransaction,
};

pub mod dispatch;
pub mod init;
pub mod start;
pub mod status;
pub mod tick;

/// Everything a rollout command needs for one invocation.
pub struct RolloutContext {
    pub settings: RolloutSettings,
    publish: bool,
}

impl RolloutContext {
    pub fn load(config: Option<&Path>, no_publish: bool) -> Result<Self> {
        let settings = RolloutSettings::load(config)?;
        let publish = settings.publish.enabled && !no_publish;
        Ok(Self { settings, publish })
    }

    pub fn from_settings(settings: RolloutSettings, publish: bool) -> Self {
        Self { settings, publish }
    }

    pub fn state_store(&self) -> Result<Box<dyn StateStore>> {
        match self.settings.store.kind {
            StoreKind::Github => {
                let client = GitHubClient::new(&self.settings.github)
                    .context("Failed to create GitHub client")?;
                Ok(Box::new(IssueStateStore::new(
                    client,
                    self.settings.github.label.clone(),
                )))
            }
            StoreKind::File => Ok(Box::new(FileStateStore::new(
                self.settings.store.state_dir.clone(),
            ))),
        }
    }

    pub fn controller(&self) -> Result<RolloutController<Box<dyn StateStore>>> {
        if self.settings.rings.is_empty() {
            tracing::warn!("no ring sets configured, nothing to roll out");
        }
        Ok(RolloutController::new(
            self.settings.rings.clone(),
            self.state_store()?,
            Box::new(ShellValidationGate::new()),
        ))
    }

    /// Commit and push ring directories when the run changed them.
    pub async fn publish(&self, report: &TickReport) -> Result<()> {
        if !report.directories_changed {
            return Ok(());
        }
        if !self.publish {
            println!("📝 Ring directories changed; publishing disabled, leaving them uncommitted");
            return Ok(());
        }

        let publish = &self.settings.publish;
        let target_roots: Vec<PathBuf> = self
            .settings
            .rings
            .iter()
            .map(|ring| ring.target_root.clone())
            .collect();

        let publisher = Git2Publisher::open(
            &publish.repo_path,
            &publish.remote,
            &publish.branch,
            &target_roots,
            self.settings.github.token.clone(),
        )?;
        let transaction = WriteBackTransaction::new(publisher, publish.max_attempts)
            .with_retry_delay(Duration::from_millis(publish.retry_delay_ms));

        match transaction.run(&report.commit_message()).await? {
            PublishReport::NothingToPublish => {
                println!("📝 Ring directories already up to date in {}", publish.branch)
            }
            PublishReport::Published { attempts } => println!(
                "📤 Published ring directories to {}/{} ({} attempt(s))",
                publish.remote, publish.branch, attempts
            ),
        }
        Ok(())
    }
}

pub fn print_report(report: &TickReport) {
    if report.is_empty() {
        println!("💤 No active rollouts");
        return;
    }

    for outcome in &report.outcomes {
        let icon = match outcome.action {
            ring_rollout::Action::Advance => "⏩",
            ring_rollout::Action::Abort => "🛑",
            ring_rollout::Action::RetryValidation => "⚠️ ",
            ring_rollout::Action::Wait => "⏳",
            ring_rollout::Action::None => "⏸️ ",
        };
        print!(
            "{icon} {} [{}] {} ring {}/{} ({})",
            outcome.rollout,
            outcome.id,
            outcome.version,
            outcome.ring,
            outcome.total_rings,
            outcome.action
        );
        if let Some(reason) = &outcome.abort_reason {
            print!(": {reason}");
        }
        if outcome.retired {
            print!(" [retired]");
        }
        println!();
    }
}
