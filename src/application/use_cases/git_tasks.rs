//! Local git tasks: clone, commit, push and init.
//!
//! All of them go through a [`VersionControl`] so check mode and failure paths can be
//! exercised without a server. Check mode never touches the working tree.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::application::services::BitbucketService;
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::branch_name::BranchName;
use crate::infrastructure::git::{Committer, TagSpec, VersionControl};

const ORIGIN: &str = "origin";

/// Removes an existing directory for `force`; returns whether there was one.
fn clear_directory(path: &Path, check_mode: bool) -> TaskResult<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if !path.is_dir() {
        return Err(TaskError::filesystem_error(
            format!("Path {} exists and is not a directory", path.display()),
            Some(path.to_path_buf()),
        ));
    }
    if !check_mode {
        info!("Removing {}", path.display());
        fs::remove_dir_all(path).map_err(|e| {
            TaskError::filesystem_error_with_source(
                format!("Error while deleting {}", path.display()),
                Some(path.to_path_buf()),
                e,
            )
        })?;
    }
    Ok(true)
}

fn require_directory(path: &Path) -> TaskResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(TaskError::filesystem_error(
            format!("Path {} does not exist", path.display()),
            Some(path.to_path_buf()),
        ))
    }
}

/// Settings for the `clone` task
#[derive(Debug, Clone)]
pub struct CloneConfig {
    pub project_key: String,
    pub repository: String,
    pub repodir: PathBuf,
    pub branch: BranchName,
    /// Remove an existing `repodir` first
    pub force: bool,
}

impl CloneConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        repodir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            repodir: repodir.into(),
            branch: BranchName::new("master"),
            force: false,
        }
    }

    pub fn with_branch(mut self, branch: impl AsRef<str>) -> Self {
        self.branch = BranchName::new(branch);
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

pub struct CloneUseCase {
    config: CloneConfig,
}

impl CloneUseCase {
    pub fn new(config: CloneConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        service: &BitbucketService,
        vcs: &dyn VersionControl,
    ) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        service.require_repository(key, slug)?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("repodir", config.repodir.display().to_string())
            .with_field("branch", config.branch.as_str());
        let check_mode = service.check_mode();

        if config.force && clear_directory(&config.repodir, check_mode)? {
            outcome.mark_changed(true);
        }

        let mut json = Map::new();
        if !check_mode {
            let url = service.endpoints().clone_url(key, slug);
            let head = vcs.clone_repository(
                url.as_str(),
                &config.repodir,
                &config.branch,
                service.credentials(),
            )?;
            json.insert("commit_hexsha".into(), Value::String(head));
            outcome.mark_changed(true);
        }
        outcome.set_field("json", Value::Object(json));
        Ok(outcome)
    }
}

/// What to commit: message, identity and an optional tag.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub message: String,
    pub committer: Committer,
    pub tag: Option<TagSpec>,
}

impl CommitRequest {
    pub fn new(message: impl Into<String>, committer: Committer) -> Self {
        Self {
            message: message.into(),
            committer,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: Option<TagSpec>) -> Self {
        self.tag = tag;
        self
    }

    fn describe(&self) -> Map<String, Value> {
        let identity = json!({ "name": self.committer.name, "email": self.committer.email });
        let mut json = Map::new();
        json.insert("author".into(), identity.clone());
        json.insert("committer".into(), identity);
        json.insert("msg".into(), Value::String(self.message.clone()));
        json.insert(
            "tag".into(),
            self.tag
                .as_ref()
                .map_or(Value::Null, |t| Value::String(t.name.clone())),
        );
        json
    }
}

/// Stages and commits everything in `repodir`; returns whether a commit was (or in check
/// mode would be) made.
fn commit_changes(
    vcs: &dyn VersionControl,
    repodir: &Path,
    request: &CommitRequest,
    check_mode: bool,
    json: &mut Map<String, Value>,
) -> TaskResult<bool> {
    if let Some(before) = vcs.head_id(repodir)? {
        json.insert("before_commit_hexsha".into(), Value::String(before));
    }
    if !vcs.has_changes(repodir)? {
        return Ok(false);
    }
    if check_mode {
        return Ok(true);
    }
    let summary = vcs.commit(
        repodir,
        &request.committer,
        &request.message,
        request.tag.clone(),
    )?;
    if let Some(after) = &summary.after {
        json.insert("after_commit_hexsha".into(), Value::String(after.clone()));
    }
    Ok(summary.committed())
}

/// Settings for the `git-commit` task
#[derive(Debug, Clone)]
pub struct GitCommitConfig {
    pub repodir: PathBuf,
    pub commit: CommitRequest,
}

pub struct GitCommitUseCase {
    config: GitCommitConfig,
}

impl GitCommitUseCase {
    pub fn new(config: GitCommitConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, vcs: &dyn VersionControl, check_mode: bool) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        require_directory(&config.repodir)?;
        let mut json = config.commit.describe();
        let changed = commit_changes(vcs, &config.repodir, &config.commit, check_mode, &mut json)?;
        Ok(TaskOutcome::new(changed)
            .with_field("repodir", config.repodir.display().to_string())
            .with_field("json", Value::Object(json)))
    }
}

/// Settings for the `push` task
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub project_key: String,
    pub repository: String,
    pub repodir: PathBuf,
    /// Commit pending changes before pushing
    pub commit: Option<CommitRequest>,
    /// Remove `repodir` after a successful push
    pub delete_repodir: bool,
}

impl PushConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        repodir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            repodir: repodir.into(),
            commit: None,
            delete_repodir: false,
        }
    }

    pub fn with_commit(mut self, commit: Option<CommitRequest>) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_delete_repodir(mut self, delete: bool) -> Self {
        self.delete_repodir = delete;
        self
    }
}

pub struct PushUseCase {
    config: PushConfig,
}

impl PushUseCase {
    pub fn new(config: PushConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        service: &BitbucketService,
        vcs: &dyn VersionControl,
    ) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let repodir = config.repodir.as_path();
        let check_mode = service.check_mode();
        service.require_repository(key, slug)?;
        require_directory(repodir)?;

        let mut json = config
            .commit
            .as_ref()
            .map(CommitRequest::describe)
            .unwrap_or_default();
        let mut changed = false;
        let mut committed = false;
        if let Some(request) = &config.commit {
            committed = commit_changes(vcs, repodir, request, check_mode, &mut json)?;
            changed |= committed;
        }

        if !vcs.has_remote(repodir, ORIGIN)? {
            changed = true;
            if !check_mode {
                let url = service.endpoints().clone_url(key, slug);
                vcs.ensure_remote(repodir, ORIGIN, url.as_str())?;
            }
        }

        let branch = vcs.current_branch(repodir)?;
        let mut refspecs = vec![branch.push_refspec()];
        if committed {
            if let Some(tag) = config.commit.as_ref().and_then(|c| c.tag.as_ref()) {
                let reference = tag.reference();
                refspecs.push(format!("{reference}:{reference}"));
            }
        }
        json.insert("refspecs".into(), json!(refspecs));

        if !check_mode {
            let summary = vcs.push(repodir, ORIGIN, &refspecs, service.credentials())?;
            if !summary.rejected.is_empty() {
                let details: Vec<String> = summary
                    .rejected
                    .iter()
                    .map(|r| format!("{}: {}", r.reference, r.message))
                    .collect();
                return Err(TaskError::version_control(format!(
                    "Push to {ORIGIN} was rejected ({})",
                    details.join(", ")
                )));
            }
            changed |= committed || !summary.up_to_date;
        }

        json.insert("deleted".into(), Value::Bool(config.delete_repodir));
        if config.delete_repodir {
            changed = true;
            clear_directory(repodir, check_mode)?;
        }

        Ok(TaskOutcome::new(changed)
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("repodir", repodir.display().to_string())
            .with_field("branch", branch.as_str())
            .with_field("json", Value::Object(json)))
    }
}

/// Settings for the `git-init` task
#[derive(Debug, Clone)]
pub struct GitInitConfig {
    pub repodir: PathBuf,
    pub force: bool,
}

pub struct GitInitUseCase {
    config: GitInitConfig,
}

impl GitInitUseCase {
    pub fn new(config: GitInitConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, vcs: &dyn VersionControl, check_mode: bool) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let mut changed = false;
        let mut missing = !config.repodir.exists();
        if config.force && clear_directory(&config.repodir, check_mode)? {
            changed = true;
            missing = true;
        }
        if missing {
            changed = true;
            if !check_mode {
                vcs.init(&config.repodir)?;
            }
        }
        Ok(TaskOutcome::new(changed)
            .with_field("repodir", config.repodir.display().to_string())
            .with_field("force", config.force))
    }
}
