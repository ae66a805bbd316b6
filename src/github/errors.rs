use octocrab::Error as OctocrabError;

#[derive(Debug)]
pub enum GitHubError {
    TokenNotFound(String),
    ConfigNotFound(String),
    ApiError(OctocrabError),
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        GitHubError::ApiError(err)
    }
}

impl std::fmt::Display for GitHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHubError::TokenNotFound(msg) => {
                writeln!(f, "GitHub Authentication Error")?;
                writeln!(f, "──────────────────────────")?;
                write!(f, "🔑 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → In a workflow: pass secrets.GITHUB_TOKEN as GITHUB_TOKEN")?;
                writeln!(f, "   → Set token directly: export RING_ROLLOUT_GITHUB__TOKEN=your_token")?;
                write!(f, "   → Or switch to the file store: [store] kind = \"file\"")
            }
            GitHubError::ConfigNotFound(msg) => {
                writeln!(f, "GitHub Configuration Error")?;
                writeln!(f, "─────────────────────────")?;
                write!(f, "📂 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Set [github] owner and repo in ring-rollout.toml")?;
                write!(f, "   → Or export RING_ROLLOUT_GITHUB__OWNER and RING_ROLLOUT_GITHUB__REPO")
            }
            GitHubError::ApiError(octocrab_err) => {
                writeln!(f, "GitHub API Error")?;
                writeln!(f, "────────────────")?;

                match octocrab_err {
                    octocrab::Error::GitHub { source, .. } => {
                        writeln!(f, "🌐 HTTP {}: {}", source.status_code, source.message)?;
                        writeln!(f)?;

                        match source.status_code.as_u16() {
                            401 => {
                                writeln!(f, "🔧 AUTHENTICATION FAILED:")?;
                                writeln!(f, "   → Token is invalid or expired")?;
                                write!(f, "   → Or export GITHUB_TOKEN=\"$(gh auth token)\"")
                            }
                            403 => {
                                writeln!(f, "🔧 PERMISSION DENIED:")?;
                                writeln!(f, "   → Token lacks required permissions")?;
                                write!(f, "   → Workflows need `issues: write` and `contents: write`")
                            }
                            404 => {
                                writeln!(f, "🔧 RESOURCE NOT FOUND:")?;
                                writeln!(f, "   → Repository may not exist or be private")?;
                                write!(f, "   → Check [github] owner and repo settings")
                            }
                            422 => {
                                writeln!(f, "🔧 VALIDATION ERROR:")?;
                                writeln!(f, "   → Request data is invalid")?;
                                write!(f, "   → Check rollout labels and repository configuration")
                            }
                            _ => {
                                writeln!(f, "🔧 TROUBLESHOOTING:")?;
                                writeln!(f, "   → Test connection: curl -I https://api.github.com")?;
                                write!(f, "   → Check rate limits: gh api rate_limit")
                            }
                        }
                    }
                    _ => {
                        write!(f, "🌐 {octocrab_err}\n\n")?;
                        writeln!(f, "🔧 TROUBLESHOOTING:")?;
                        writeln!(f, "   → Test connection: curl -I https://api.github.com")?;
                        write!(f, "   → GitHub status page: https://status.github.com")
                    }
                }
            }
        }
    }
}

impl std::error::Error for GitHubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitHubError::ApiError(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_error_points_at_environment() {
        let message = GitHubError::TokenNotFound("no token configured".to_string()).to_string();
        assert!(message.contains("no token configured"));
        assert!(message.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn config_error_mentions_settings_file() {
        let message = GitHubError::ConfigNotFound("owner missing".to_string()).to_string();
        assert!(message.contains("ring-rollout.toml"));
    }
}
