use git2::{
    Cred, ErrorCode, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository,
    Signature,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{PushOutcome, RingPublisher};
use crate::rollout::RolloutError;

/// Publishes ring directories by committing them and pushing with libgit2.
pub struct Git2Publisher {
    repo: Repository,
    remote: String,
    branch: String,
    /// Ring target roots, relative to the repository working directory
    paths: Vec<PathBuf>,
    token: Option<String>,
}

impl Git2Publisher {
    pub fn open<P: AsRef<Path>>(
        repo_path: P,
        remote: &str,
        branch: &str,
        paths: &[PathBuf],
        token: Option<String>,
    ) -> Result<Self, RolloutError> {
        let repo = Repository::open(repo_path)?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| RolloutError::config("cannot publish from a bare repository"))?;
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let paths = paths
            .iter()
            .map(|path| relative_to(&workdir, path))
            .collect();

        Ok(Self {
            repo,
            remote: remote.to_string(),
            branch: branch.to_string(),
            paths,
            token,
        })
    }

    fn signature(&self) -> Result<Signature<'static>, RolloutError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now(
                "ring-rollout",
                "ring-rollout@users.noreply.github.com",
            )?),
        }
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let token = self.token.as_deref();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, _allowed_types| match token {
            Some(token) => Cred::userpass_plaintext("x-access-token", token),
            None => Cred::ssh_key(
                username_from_url.unwrap_or("git"),
                None,
                Path::new(&format!(
                    "{}/.ssh/id_rsa",
                    std::env::var("HOME").unwrap_or_default()
                )),
                None,
            ),
        });
        callbacks
    }
}

/// Express `path` relative to the repository working directory.
fn relative_to(workdir: &Path, path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let absolute = absolute.canonicalize().unwrap_or(absolute);
    absolute
        .strip_prefix(workdir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Owner and repository name of a GitHub remote URL, if it is one.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let path = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_string(), repo.to_string()))
        }
        _ => None,
    }
}

/// GitHub repository behind `remote` of the repository at `repo_path`.
pub fn detect_github_repository(repo_path: &Path, remote: &str) -> Option<(String, String)> {
    let repo = Repository::discover(repo_path).ok()?;
    let remote = repo.find_remote(remote).ok()?;
    parse_github_url(remote.url()?)
}

impl RingPublisher for Git2Publisher {
    fn commit(&self, message: &str) -> Result<bool, RolloutError> {
        let mut index = self.repo.index()?;
        let specs: Vec<&Path> = self.paths.iter().map(PathBuf::as_path).collect();
        index.add_all(specs.iter(), IndexAddOption::DEFAULT, None)?;
        // Picks up files removed by a ring replacement.
        index.update_all(specs.iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
            debug!("index matches HEAD, no commit needed");
            return Ok(false);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;
        let parents: Vec<_> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        info!(commit = %oid, "committed ring directories");
        Ok(true)
    }

    fn push(&self) -> Result<PushOutcome, RolloutError> {
        let mut remote = self.repo.find_remote(&self.remote)?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);

        let mut rejection: Option<String> = None;
        let result = {
            let mut callbacks = self.callbacks();
            callbacks.push_update_reference(|_refname, status| {
                if let Some(status) = status {
                    rejection = Some(status.to_string());
                }
                Ok(())
            });
            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut push_options))
        };

        match result {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                return Ok(PushOutcome::Rejected(e.message().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(match rejection {
            Some(reason) => PushOutcome::Rejected(reason),
            None => PushOutcome::Published,
        })
    }

    fn rebase_onto_remote(&self) -> Result<(), RolloutError> {
        let mut remote = self.repo.find_remote(&self.remote)?;
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.callbacks());
        remote.fetch(&[self.branch.as_str()], Some(&mut fetch_options), None)?;

        let fetch_head = self.repo.find_reference("FETCH_HEAD")?;
        let upstream = self.repo.reference_to_annotated_commit(&fetch_head)?;
        let head = self.repo.head()?;
        let local = self.repo.reference_to_annotated_commit(&head)?;
        let signature = self.signature()?;

        let mut rebase = self.repo.rebase(Some(&local), Some(&upstream), None, None)?;
        while let Some(operation) = rebase.next() {
            operation?;
            if self.repo.index()?.has_conflicts() {
                rebase.abort()?;
                return Err(RolloutError::RebaseConflict {
                    remote: self.remote.clone(),
                    branch: self.branch.clone(),
                });
            }
            match rebase.commit(None, &signature, None) {
                Ok(_) => {}
                // Patch already present upstream.
                Err(e) if e.code() == ErrorCode::Applied => {}
                Err(e) => {
                    rebase.abort()?;
                    return Err(e.into());
                }
            }
        }
        rebase.finish(Some(&signature))?;

        info!(remote = %self.remote, branch = %self.branch, "rebased onto remote");
        Ok(())
    }
}
