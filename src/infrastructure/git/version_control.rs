use std::path::Path;

use super::repository::{CommitSummary, Committer, GitRepository, PushSummary, TagSpec};
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::credentials::Credentials;

/// Local git operations used by the clone/commit/push/init tasks.
#[cfg_attr(test, mockall::automock)]
pub trait VersionControl {
    fn init(&self, path: &Path) -> TaskResult<()>;

    /// Clones and returns the checked out commit id.
    fn clone_repository(
        &self,
        url: &str,
        dest: &Path,
        branch: &BranchName,
        credentials: &Credentials,
    ) -> TaskResult<String>;

    fn has_changes(&self, repo: &Path) -> TaskResult<bool>;

    fn head_id(&self, repo: &Path) -> TaskResult<Option<String>>;

    fn current_branch(&self, repo: &Path) -> TaskResult<BranchName>;

    fn commit(
        &self,
        repo: &Path,
        committer: &Committer,
        message: &str,
        tag: Option<TagSpec>,
    ) -> TaskResult<CommitSummary>;

    fn has_remote(&self, repo: &Path, name: &str) -> TaskResult<bool>;

    fn ensure_remote(&self, repo: &Path, name: &str, url: &str) -> TaskResult<bool>;

    fn push(
        &self,
        repo: &Path,
        remote: &str,
        refspecs: &[String],
        credentials: &Credentials,
    ) -> TaskResult<PushSummary>;
}

/// [`VersionControl`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2VersionControl;

impl Git2VersionControl {
    pub fn new() -> Self {
        Self
    }
}

impl VersionControl for Git2VersionControl {
    fn init(&self, path: &Path) -> TaskResult<()> {
        GitRepository::init(path).map(|_| ())
    }

    fn clone_repository(
        &self,
        url: &str,
        dest: &Path,
        branch: &BranchName,
        credentials: &Credentials,
    ) -> TaskResult<String> {
        let repo = GitRepository::clone(url, dest, branch, credentials)?;
        repo.head_id()?.ok_or_else(|| {
            TaskError::version_control(format!("Clone of {url} has no commit on {branch}"))
        })
    }

    fn has_changes(&self, repo: &Path) -> TaskResult<bool> {
        GitRepository::open(repo)?.has_changes()
    }

    fn head_id(&self, repo: &Path) -> TaskResult<Option<String>> {
        GitRepository::open(repo)?.head_id()
    }

    fn current_branch(&self, repo: &Path) -> TaskResult<BranchName> {
        GitRepository::open(repo)?.current_branch()
    }

    fn commit(
        &self,
        repo: &Path,
        committer: &Committer,
        message: &str,
        tag: Option<TagSpec>,
    ) -> TaskResult<CommitSummary> {
        GitRepository::open(repo)?.commit_all(committer, message, tag.as_ref())
    }

    fn has_remote(&self, repo: &Path, name: &str) -> TaskResult<bool> {
        Ok(GitRepository::open(repo)?.has_remote(name))
    }

    fn ensure_remote(&self, repo: &Path, name: &str, url: &str) -> TaskResult<bool> {
        GitRepository::open(repo)?.ensure_remote(name, url)
    }

    fn push(
        &self,
        repo: &Path,
        remote: &str,
        refspecs: &[String],
        credentials: &Credentials,
    ) -> TaskResult<PushSummary> {
        GitRepository::open(repo)?.push(remote, refspecs, credentials)
    }
}
