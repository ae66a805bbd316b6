//! Init command: writes a starter `ring-rollout.toml` and, optionally,
//! creates the control labels operators use to steer rollouts.
//!
//! An existing settings file is never overwritten without `--force`.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use ring_rollout::config::DEFAULT_CONFIG_FILE;
use ring_rollout::publish::detect_github_repository;
use ring_rollout::rollout::flags::{ABORT_TAG, FASTLANE_TAG, IGNORE_VALIDATION_TAG, PAUSED_TAG};
use ring_rollout::{GitHubClient, RingConfig, RolloutSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub name: String,
    pub color: String,
    pub description: String,
}

pub struct InitCommand {
    pub path: PathBuf,
    pub force: bool,
    pub labels: bool,
    pub dry_run: bool,
}

impl InitCommand {
    pub fn new(path: Option<PathBuf>, force: bool, labels: bool, dry_run: bool) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            force,
            labels,
            dry_run,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if self.dry_run {
            println!("🚀 RING ROLLOUT INIT (DRY RUN)");
        } else {
            println!("🚀 RING ROLLOUT INIT");
        }
        println!("====================");
        println!();

        let settings = starter_settings(Path::new("."));
        self.write_settings(&settings)?;

        if self.labels {
            self.setup_labels(&settings).await?;
        }

        println!();
        println!("💡 Next: edit the [[rings]] entries, then run 'ring-rollout start --version <rev>'");
        Ok(())
    }

    fn write_settings(&self, settings: &RolloutSettings) -> Result<()> {
        if self.path.exists() && !self.force {
            return Err(anyhow!(
                "{} already exists. Use --force to overwrite it.",
                self.path.display()
            ));
        }

        if self.dry_run {
            println!("Would write {}:", self.path.display());
            println!("{}", toml::to_string_pretty(settings)?);
            return Ok(());
        }

        settings.save_to_file(&self.path)?;
        println!("✅ Wrote {}", self.path.display());
        Ok(())
    }

    async fn setup_labels(&self, settings: &RolloutSettings) -> Result<()> {
        let labels = required_labels(&settings.github.label);

        if self.dry_run {
            println!("Would create {} labels:", labels.len());
            for label in &labels {
                println!("  🏷️  {} (#{}) - {}", label.name, label.color, label.description);
            }
            return Ok(());
        }

        let client = GitHubClient::new(&settings.github)
            .map_err(|e| anyhow!("Failed to create GitHub client: {}", e))?;
        let issues = client.issues();

        for label in &labels {
            if issues
                .create_label(&label.name, &label.color, &label.description)
                .await?
            {
                println!("🏷️  Created label '{}'", label.name);
            } else {
                println!("🏷️  Label '{}' already exists", label.name);
            }
        }
        Ok(())
    }
}

/// Settings with one example ring set, pointed at the detected GitHub repository.
pub fn starter_settings(repo_path: &Path) -> RolloutSettings {
    let mut settings = RolloutSettings::default();
    if let Some((owner, repo)) = detect_github_repository(repo_path, &settings.publish.remote) {
        settings.github.owner = owner;
        settings.github.repo = repo;
    } else {
        println!("⚠️  No GitHub remote found; set [github] owner and repo by hand");
    }

    settings.rings.push(
        RingConfig::new(
            "feature-flags",
            "flags/**/*.json",
            "rings/feature-flags",
            &["30m", "2h", "24h"],
        )
        .with_validation("./scripts/validate-flags.sh", 2),
    );
    settings
}

pub fn required_labels(marker: &str) -> Vec<LabelSpec> {
    let label = |name: &str, color: &str, description: &str| LabelSpec {
        name: name.to_string(),
        color: color.to_string(),
        description: description.to_string(),
    };

    vec![
        label(marker, "0052cc", "Tracks a ring rollout"),
        label(ABORT_TAG, "b60205", "Abort this rollout on the next tick"),
        label(PAUSED_TAG, "fbca04", "Hold this rollout at its current ring"),
        label(FASTLANE_TAG, "5319e7", "Skip wait durations (validation still runs)"),
        label(
            IGNORE_VALIDATION_TAG,
            "e99695",
            "Skip the validation command (wait durations still apply)",
        ),
    ]
}
