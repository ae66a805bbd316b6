use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rings::compile_pattern;
use crate::rollout::{parse_schedule, RolloutError};

pub const DEFAULT_CONFIG_FILE: &str = "ring-rollout.toml";

/// Main configuration structure for ring-rollout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RolloutSettings {
    /// GitHub configuration
    pub github: GitHubConfig,
    /// Where rollout state is kept
    pub store: StoreConfig,
    /// Publishing of ring directories back to the repository
    pub publish: PublishConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Ring sets to roll out
    #[serde(default)]
    pub rings: Vec<RingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// GitHub API token (can be set via env var)
    pub token: Option<String>,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Label carried by every rollout issue
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Github,
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory used by the file store
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    /// Commit and push ring directories after they change
    pub enabled: bool,
    /// Repository holding the ring directories
    pub repo_path: PathBuf,
    pub remote: String,
    pub branch: String,
    /// Push attempts before the run fails
    pub max_attempts: u32,
    /// Pause between a rejected push and the next attempt
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable output
    pub json: bool,
}

/// What to do with an in-flight rollout when a new one starts for the same
/// ring set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateHandling {
    /// Abort and retire the in-flight rollout
    #[default]
    Abort,
    /// Let both rollouts run side by side
    Allow,
}

/// One linear sequence of rings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RingConfig {
    pub name: String,
    /// Glob selecting the artifacts, relative to `source_root`
    pub pattern: String,
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Ring snapshots live in `<target_root>/<index>/`
    pub target_root: PathBuf,
    #[serde(default)]
    pub duplicate_handling: DuplicateHandling,
    /// Dwell time per ring, e.g. `["5m", "1h"]`
    pub wait_durations: Vec<String>,
    #[serde(default)]
    pub validation_command: Option<String>,
    #[serde(default)]
    pub validation_max_retries: u32,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

impl RingConfig {
    pub fn new(name: &str, pattern: &str, target_root: impl Into<PathBuf>, waits: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            source_root: default_source_root(),
            target_root: target_root.into(),
            duplicate_handling: DuplicateHandling::default(),
            wait_durations: waits.iter().map(|w| w.to_string()).collect(),
            validation_command: None,
            validation_max_retries: 0,
        }
    }

    pub fn with_validation(mut self, command: &str, max_retries: u32) -> Self {
        self.validation_command = Some(command.to_string());
        self.validation_max_retries = max_retries;
        self
    }

    /// Parsed wait schedule. An empty schedule is rejected.
    pub fn schedule(&self) -> Result<Vec<Duration>, RolloutError> {
        if self.wait_durations.is_empty() {
            return Err(RolloutError::config(format!(
                "ring set '{}' has no wait durations",
                self.name
            )));
        }
        parse_schedule(&self.wait_durations)
    }

    /// Everything that can be rejected without touching disk: the artifact
    /// pattern must compile and the schedule must parse.
    pub fn check(&self) -> Result<Vec<Duration>, RolloutError> {
        compile_pattern(&self.pattern)?;
        self.schedule()
    }
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            github: GitHubConfig {
                token: None, // Will be read from env var
                owner: String::new(),
                repo: String::new(),
                label: "ring-rollout".to_string(),
            },
            store: StoreConfig {
                kind: StoreKind::Github,
                state_dir: PathBuf::from(".ring-rollout/state"),
            },
            publish: PublishConfig {
                enabled: true,
                repo_path: PathBuf::from("."),
                remote: "origin".to_string(),
                branch: "main".to_string(),
                max_attempts: 3,
                retry_delay_ms: 1000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: false,
            },
            rings: Vec::new(),
        }
    }
}

impl RolloutSettings {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (ring-rollout.toml or an explicit path)
    /// 3. Environment variables (prefixed with RING_ROLLOUT, `__` between sections)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&RolloutSettings::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("RING_ROLLOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to read configuration")?;
        let mut settings: RolloutSettings = config
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if settings.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                settings.github.token = Some(token);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the engine cannot run before anything is touched.
    pub fn validate(&self) -> Result<(), RolloutError> {
        let mut names = HashSet::new();
        for ring in &self.rings {
            if ring.name.trim().is_empty() {
                return Err(RolloutError::config("ring set with an empty name"));
            }
            if !names.insert(ring.name.as_str()) {
                return Err(RolloutError::config(format!(
                    "ring set '{}' is configured twice",
                    ring.name
                )));
            }
            if ring.pattern.trim().is_empty() {
                return Err(RolloutError::config(format!(
                    "ring set '{}' has an empty artifact pattern",
                    ring.name
                )));
            }
            ring.check()?;
        }
        if self.publish.max_attempts == 0 {
            return Err(RolloutError::config("publish.max_attempts must be at least 1"));
        }
        Ok(())
    }

    pub fn ring(&self, name: &str) -> Option<&RingConfig> {
        self.rings.iter().find(|ring| ring.name == name)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
