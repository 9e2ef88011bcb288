use git2::{
    build::RepoBuilder, Cred, CredentialType, FetchOptions, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository as Git2Repository, Signature, StatusOptions,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::common::error::TaskError;
use crate::common::result::{ResultExt, TaskResult};
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::credentials::Credentials;

/// Name and email used for both author and committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Committer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A tag to place on the new commit; annotated when a message is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub message: Option<String>,
}

impl TagSpec {
    pub fn lightweight(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
        }
    }

    pub fn annotated(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Some(message.into()),
        }
    }

    pub fn reference(&self) -> String {
        format!("refs/tags/{}", self.name)
    }
}

/// HEAD before and after a commit attempt. `after` is `None` when nothing was committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl CommitSummary {
    pub fn committed(&self) -> bool {
        self.after.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRejection {
    pub reference: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub refspecs: Vec<String>,
    /// The remote tracking ref already pointed at local HEAD before the push
    pub up_to_date: bool,
    pub rejected: Vec<RefRejection>,
}

/// Wrapper around git2::Repository with the operations the git tasks need
pub struct GitRepository {
    repo: Git2Repository,
    path: PathBuf,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.path)
            .field("repo", &"<git2::Repository>")
            .finish()
    }
}

/// Credential callback answering user/password challenges from `credentials`.
fn remote_callbacks(credentials: &Credentials) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let (username, secret) = credentials.git_user_pass(username_from_url);
            Cred::userpass_plaintext(username, secret)
        } else {
            Err(git2::Error::from_str(
                "remote asked for a credential type other than username/password",
            ))
        }
    });
    callbacks
}

impl GitRepository {
    /// Open an existing Git repository
    pub fn open<P: AsRef<Path>>(path: P) -> TaskResult<Self> {
        let path_buf = path.as_ref().to_path_buf();

        if !path_buf.exists() {
            return Err(TaskError::filesystem_error(
                format!("Path {} does not exist.", path_buf.display()),
                Some(path_buf),
            ));
        }

        let repo = Git2Repository::open(&path_buf).with_git_error(format!(
            "{} is not a valid git repository",
            path_buf.display()
        ))?;

        Ok(Self {
            repo,
            path: path_buf,
        })
    }

    /// Initialize a new Git repository, creating the directory when needed
    pub fn init<P: AsRef<Path>>(path: P) -> TaskResult<Self> {
        let path_buf = path.as_ref().to_path_buf();

        if !path_buf.exists() {
            std::fs::create_dir_all(&path_buf).with_filesystem_error(
                "Failed to create repository directory",
                Some(path_buf.clone()),
            )?;
        }

        let repo = Git2Repository::init(&path_buf).with_git_error(format!(
            "Failed to initialize git repository in {}",
            path_buf.display()
        ))?;

        Ok(Self {
            repo,
            path: path_buf,
        })
    }

    /// Clone `url` into `target_path`, checking out `branch`
    pub fn clone(
        url: &str,
        target_path: &Path,
        branch: &BranchName,
        credentials: &Credentials,
    ) -> TaskResult<Self> {
        if let Some(parent) = target_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_filesystem_error(
                    "Failed to create parent directory",
                    Some(parent.to_path_buf()),
                )?;
            }
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credentials));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        builder.branch(branch.as_str());

        info!("Cloning {} ({}) into {}", url, branch, target_path.display());
        let repo = builder
            .clone(url, target_path)
            .with_git_error(format!("Error while cloning {url} repository"))?;

        Ok(Self {
            repo,
            path: target_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// HEAD commit id, `None` on an unborn branch
    pub fn head_id(&self) -> TaskResult<Option<String>> {
        Ok(self.head_oid()?.map(|oid| oid.to_string()))
    }

    fn head_oid(&self) -> TaskResult<Option<Oid>> {
        match self.repo.head() {
            Ok(head) => Ok(head.target()),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(TaskError::version_control_with_source("Failed to read HEAD", e)),
        }
    }

    /// Branch HEAD points at, also for an unborn branch
    pub fn current_branch(&self) -> TaskResult<BranchName> {
        let head = self
            .repo
            .find_reference("HEAD")
            .with_git_error("Failed to read HEAD")?;
        match head.symbolic_target() {
            Some(target) => Ok(BranchName::new(target)),
            None => Err(TaskError::version_control(format!(
                "HEAD of {} is detached",
                self.path.display()
            ))),
        }
    }

    /// Untracked, modified or deleted files relative to HEAD
    pub fn has_changes(&self) -> TaskResult<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .with_git_error("Failed to read working tree status")?;
        Ok(!statuses.is_empty())
    }

    /// Stages new, modified and deleted files and returns the resulting tree id
    fn stage_all(&self) -> TaskResult<Oid> {
        let mut index = self.repo.index().with_git_error("Failed to open index")?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .with_git_error("Failed to stage files")?;
        index
            .update_all(["*"].iter(), None)
            .with_git_error("Failed to stage removals")?;
        index.write().with_git_error("Failed to write index")?;
        index.write_tree().with_git_error("Failed to write tree")
    }

    /// Stages everything and commits it; nothing is committed when the tree is unchanged.
    pub fn commit_all(
        &self,
        committer: &Committer,
        message: &str,
        tag: Option<&TagSpec>,
    ) -> TaskResult<CommitSummary> {
        let before = self.head_oid()?;
        let tree_id = self.stage_all()?;

        let parent = match before {
            Some(oid) => Some(
                self.repo
                    .find_commit(oid)
                    .with_git_error("Failed to read HEAD commit")?,
            ),
            None => None,
        };

        let unchanged = match &parent {
            Some(commit) => commit.tree_id() == tree_id,
            None => self
                .repo
                .find_tree(tree_id)
                .with_git_error("Failed to read tree")?
                .is_empty(),
        };
        if unchanged {
            debug!("Nothing to commit in {}", self.path.display());
            return Ok(CommitSummary {
                before: before.map(|oid| oid.to_string()),
                after: None,
            });
        }

        let signature = Signature::now(&committer.name, &committer.email)
            .with_git_error("Invalid committer")?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .with_git_error("Failed to read tree")?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let commit_id = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .with_git_error("Failed to commit")?;
        info!("Committed {} in {}", commit_id, self.path.display());

        if let Some(tag) = tag {
            self.tag(commit_id, tag, &signature)?;
        }

        Ok(CommitSummary {
            before: before.map(|oid| oid.to_string()),
            after: Some(commit_id.to_string()),
        })
    }

    fn tag(&self, commit_id: Oid, tag: &TagSpec, signature: &Signature<'_>) -> TaskResult<()> {
        let target = self
            .repo
            .find_object(commit_id, None)
            .with_git_error("Failed to find commit to tag")?;
        let result = match &tag.message {
            Some(message) => self.repo.tag(&tag.name, &target, signature, message, false),
            None => self.repo.tag_lightweight(&tag.name, &target, false),
        };
        result.with_git_error(format!("Failed to create tag {}", tag.name))?;
        Ok(())
    }

    pub fn has_remote(&self, name: &str) -> bool {
        self.repo.find_remote(name).is_ok()
    }

    /// Creates the remote when missing; returns whether it was created.
    pub fn ensure_remote(&self, name: &str, url: &str) -> TaskResult<bool> {
        if self.has_remote(name) {
            return Ok(false);
        }
        self.repo
            .remote(name, url)
            .with_git_error(format!("Failed to create remote {name}"))?;
        info!("Added remote {} -> {}", name, url);
        Ok(true)
    }

    /// Id of `refs/remotes/<remote>/<branch>`, if known locally
    pub fn tracking_id(&self, remote: &str, branch: &BranchName) -> Option<String> {
        self.repo
            .refname_to_id(&format!("refs/remotes/{remote}/{}", branch.as_str()))
            .ok()
            .map(|oid| oid.to_string())
    }

    /// Pushes `refspecs` to `remote`; rejected refs end up in the summary, not as an error.
    pub fn push(
        &self,
        remote: &str,
        refspecs: &[String],
        credentials: &Credentials,
    ) -> TaskResult<PushSummary> {
        let branch = self.current_branch()?;
        let up_to_date = match (self.head_id()?, self.tracking_id(remote, &branch)) {
            (Some(local), Some(tracked)) => local == tracked,
            _ => false,
        };

        let mut remote_handle = self
            .repo
            .find_remote(remote)
            .with_git_error(format!("Remote {remote} not found"))?;

        let rejected = RefCell::new(Vec::new());
        {
            let mut callbacks = remote_callbacks(credentials);
            callbacks.push_update_reference(|reference, status| {
                if let Some(message) = status {
                    rejected.borrow_mut().push(RefRejection {
                        reference: reference.to_string(),
                        message: message.to_string(),
                    });
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);

            info!("Pushing {:?} to {}", refspecs, remote);
            remote_handle
                .push(refspecs, Some(&mut options))
                .with_git_error(format!("Failed to push to {remote}"))?;
        }

        Ok(PushSummary {
            refspecs: refspecs.to_vec(),
            up_to_date,
            rejected: rejected.into_inner(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn committer() -> Committer {
        Committer::new("Jane Doe", "jane@example.com")
    }

    #[test]
    fn test_init_creates_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/repo");
        let repo = GitRepository::init(&path).unwrap();
        assert!(path.join(".git").exists());
        assert_eq!(repo.head_id().unwrap(), None);
        assert!(!repo.current_branch().unwrap().as_str().is_empty());
    }

    #[test]
    fn test_open_missing_path() {
        let result = GitRepository::open("/nonexistent/bbtask-repo");
        assert!(matches!(result, Err(TaskError::FileSystem { .. })));
    }

    #[test]
    fn test_commit_then_nothing_to_commit() {
        let temp = TempDir::new().unwrap();
        let repo = GitRepository::init(temp.path()).unwrap();

        let empty = repo.commit_all(&committer(), "empty", None).unwrap();
        assert!(!empty.committed());

        fs::write(temp.path().join("README.md"), "hello\n").unwrap();
        assert!(repo.has_changes().unwrap());
        let first = repo.commit_all(&committer(), "initial", None).unwrap();
        assert!(first.committed());
        assert_eq!(first.before, None);
        assert_eq!(repo.head_id().unwrap(), first.after);
        assert!(!repo.has_changes().unwrap());

        let again = repo.commit_all(&committer(), "again", None).unwrap();
        assert!(!again.committed());
        assert_eq!(again.before, first.after);
    }

    #[test]
    fn test_commit_stages_modifications_and_tags() {
        let temp = TempDir::new().unwrap();
        let repo = GitRepository::init(temp.path()).unwrap();
        fs::write(temp.path().join("a.txt"), "one\n").unwrap();
        repo.commit_all(&committer(), "one", None).unwrap();

        fs::write(temp.path().join("a.txt"), "two\n").unwrap();
        let summary = repo
            .commit_all(&committer(), "two", Some(&TagSpec::annotated("v1.0.0", "release")))
            .unwrap();
        let after = summary.after.unwrap();

        let raw = Git2Repository::open(temp.path()).unwrap();
        let tagged = raw
            .revparse_single("v1.0.0^{commit}")
            .unwrap()
            .id()
            .to_string();
        assert_eq!(tagged, after);
        assert_eq!(
            raw.head().unwrap().peel_to_commit().unwrap().message(),
            Some("two")
        );
    }

    #[test]
    fn test_ensure_remote_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let repo = GitRepository::init(temp.path()).unwrap();
        assert!(repo
            .ensure_remote("origin", "https://bb.example.com/scm/FOO/bar.git")
            .unwrap());
        assert!(!repo
            .ensure_remote("origin", "https://other.example.com/x.git")
            .unwrap());
        assert!(repo.has_remote("origin"));
    }

    #[test]
    fn test_push_to_local_bare_then_clone() {
        let temp = TempDir::new().unwrap();
        let bare_path = temp.path().join("remote.git");
        Git2Repository::init_bare(&bare_path).unwrap();

        let work = temp.path().join("work");
        let repo = GitRepository::init(&work).unwrap();
        fs::write(work.join("file.txt"), "content\n").unwrap();
        let summary = repo.commit_all(&committer(), "initial", None).unwrap();

        let url = bare_path.to_str().unwrap();
        repo.ensure_remote("origin", url).unwrap();
        let branch = repo.current_branch().unwrap();
        let credentials = Credentials::basic("jsmith", "secret");
        let pushed = repo
            .push("origin", &[branch.push_refspec()], &credentials)
            .unwrap();
        assert!(pushed.rejected.is_empty());
        assert!(!pushed.up_to_date);

        let clone_path = temp.path().join("clone");
        let cloned = GitRepository::clone(url, &clone_path, &branch, &credentials).unwrap();
        assert_eq!(cloned.head_id().unwrap(), summary.after);
        assert!(clone_path.join("file.txt").exists());
    }
}
