use octocrab::Octocrab;

use super::errors::GitHubError;
use super::issues::IssueHandler;
use crate::config::GitHubConfig;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let token = Self::read_token(config)?;
        let (owner, repo) = Self::read_repository(config)?;

        let octocrab = Octocrab::builder().personal_token(token).build()?;

        Ok(GitHubClient {
            octocrab,
            owner,
            repo,
        })
    }

    fn read_token(config: &GitHubConfig) -> Result<String, GitHubError> {
        match config.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(GitHubError::TokenNotFound(
                "GitHub token not found. Set RING_ROLLOUT_GITHUB__TOKEN or GITHUB_TOKEN, or add \
                 [github] token to the settings file."
                    .to_string(),
            )),
        }
    }

    fn read_repository(config: &GitHubConfig) -> Result<(String, String), GitHubError> {
        // Actions exposes "owner/repo" for the running workflow.
        let from_actions = std::env::var("GITHUB_REPOSITORY").ok().and_then(|slug| {
            let (owner, repo) = slug.split_once('/')?;
            Some((owner.to_string(), repo.to_string()))
        });

        let owner = Some(config.owner.clone())
            .filter(|owner| !owner.is_empty())
            .or_else(|| from_actions.as_ref().map(|(owner, _)| owner.clone()));
        let repo = Some(config.repo.clone())
            .filter(|repo| !repo.is_empty())
            .or_else(|| from_actions.as_ref().map(|(_, repo)| repo.clone()));

        match (owner, repo) {
            (Some(owner), Some(repo)) => Ok((owner, repo)),
            _ => Err(GitHubError::ConfigNotFound(
                "GitHub owner and repo are not configured and GITHUB_REPOSITORY is not set."
                    .to_string(),
            )),
        }
    }

    pub fn issues(&self) -> IssueHandler {
        IssueHandler::new(self.octocrab.clone(), self.owner.clone(), self.repo.clone())
    }
}
