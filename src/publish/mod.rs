//! Write-back transaction
//!
//! Publishes changed ring directories to the shared repository. Pushes that
//! lose a race with another run are rebased onto the remote and retried a
//! bounded number of times; running out of attempts fails the invocation.

pub mod git;

pub use git::{detect_github_repository, parse_github_url, Git2Publisher};

use std::time::Duration;
use tracing::{info, warn};

use crate::rollout::RolloutError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Published,
    /// The remote moved underneath us.
    Rejected(String),
}

/// Version-control operations needed to publish ring directories.
#[cfg_attr(test, automock)]
pub trait RingPublisher {
    /// Stage the ring directories and commit them. Returns `false` when there
    /// was nothing to commit.
    fn commit(&self, message: &str) -> Result<bool, RolloutError>;

    fn push(&self) -> Result<PushOutcome, RolloutError>;

    /// Replay local commits on top of the latest remote branch.
    fn rebase_onto_remote(&self) -> Result<(), RolloutError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    NothingToPublish,
    Published { attempts: u32 },
}

pub struct WriteBackTransaction<P> {
    publisher: P,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<P: RingPublisher> WriteBackTransaction<P> {
    pub fn new(publisher: P, max_attempts: u32) -> Self {
        Self {
            publisher,
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn run(&self, message: &str) -> Result<PublishReport, RolloutError> {
        if !self.publisher.commit(message)? {
            info!("ring directories unchanged, nothing to publish");
            return Ok(PublishReport::NothingToPublish);
        }

        let mut last_reason = String::new();
        for attempt in 1..=self.max_attempts {
            match self.publisher.push()? {
                PushOutcome::Published => {
                    info!(attempt, "published ring directories");
                    return Ok(PublishReport::Published { attempts: attempt });
                }
                PushOutcome::Rejected(reason) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        %reason,
                        "push rejected"
                    );
                    last_reason = reason;
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                        self.publisher.rebase_onto_remote()?;
                    }
                }
            }
        }

        Err(RolloutError::PublishConflict {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}
