use octocrab::models::issues::Issue;
use octocrab::models::IssueState;
use octocrab::Octocrab;
use std::time::Duration;

use super::errors::GitHubError;

const MAX_ATTEMPTS: u32 = 3;

/// Handler for the issue operations rollout state relies on
#[derive(Debug)]
pub struct IssueHandler {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

impl IssueHandler {
    pub fn new(octocrab: Octocrab, owner: String, repo: String) -> Self {
        Self {
            octocrab,
            owner,
            repo,
        }
    }

    /// Open issues carrying every one of `labels`, oldest first.
    pub async fn list_open_with_labels(&self, labels: &[String]) -> Result<Vec<Issue>, GitHubError> {
        let page = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .list()
            .state(octocrab::params::State::Open)
            .labels(labels)
            .per_page(100)
            .send()
            .await?;

        let mut issues = self.octocrab.all_pages(page).await?;
        // The issues endpoint also returns pull requests.
        issues.retain(|issue| issue.pull_request.is_none());
        issues.sort_by_key(|issue| issue.number);
        Ok(issues)
    }

    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: Vec<String>,
    ) -> Result<Issue, GitHubError> {
        let issue = self
            .octocrab
            .issues(&self.owner, &self.repo)
            .create(title)
            .body(body)
            .labels(labels)
            .send()
            .await?;

        tracing::info!(issue = issue.number, title, "created rollout issue");
        Ok(issue)
    }

    /// Replace an issue body, retrying transient failures.
    pub async fn update_body(&self, issue_number: u64, body: &str) -> Result<Issue, GitHubError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self
                .octocrab
                .issues(&self.owner, &self.repo)
                .update(issue_number)
                .body(body)
                .send()
                .await
            {
                Ok(issue) => return Ok(issue),
                Err(e) if attempts < MAX_ATTEMPTS => {
                    tracing::warn!("GitHub API call failed (attempt {}): {:?}", attempts, e);
                    tokio::time::sleep(Duration::from_millis(500 * attempts as u64)).await;
                    continue;
                }
                Err(e) => return Err(GitHubError::from(e)),
            }
        }
    }

    pub async fn create_comment(&self, issue_number: u64, body: &str) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .create_comment(issue_number, body)
            .await?;

        tracing::debug!(issue = issue_number, "commented on rollout issue");
        Ok(())
    }

    pub async fn close_issue(&self, issue_number: u64) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .update(issue_number)
            .state(IssueState::Closed)
            .send()
            .await?;

        tracing::info!(issue = issue_number, "closed rollout issue");
        Ok(())
    }

    /// Create a repository label. Returns `false` when it already exists.
    pub async fn create_label(
        &self,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<bool, GitHubError> {
        match self
            .octocrab
            .issues(&self.owner, &self.repo)
            .create_label(name, color, description)
            .await
        {
            Ok(_) => Ok(true),
            Err(octocrab::Error::GitHub { source, .. })
                if source.message.contains("already_exists")
                    || source.errors.as_ref().is_some_and(|errors| {
                        errors.iter().any(|e| e.to_string().contains("already_exists"))
                    }) =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
