//! Keep one file of a repository at the given content, committing through the REST API.

use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record_reconcile;
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::error::TaskError;
use crate::common::result::{ResultExt, TaskResult};
use crate::domain::entities::item::{str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;
use crate::infrastructure::http::request::FormPart;

/// Where the desired file content comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CopySource {
    File(PathBuf),
    Content(String),
}

impl CopySource {
    fn read(&self) -> TaskResult<Vec<u8>> {
        match self {
            Self::Content(content) => Ok(content.clone().into_bytes()),
            Self::File(path) => {
                if !path.is_file() {
                    return Err(TaskError::filesystem_error(
                        format!("Source {} not found or not a file", path.display()),
                        Some(path.clone()),
                    ));
                }
                std::fs::read(path)
                    .with_filesystem_error("Source not readable", Some(path.clone()))
            }
        }
    }
}

/// Settings for the `copy` task
#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub project_key: String,
    pub repository: String,
    pub source: CopySource,
    /// Path inside the repository
    pub dest: String,
    /// Default branch when `None`
    pub branch: Option<String>,
    /// Server default commit message when `None`
    pub message: Option<String>,
}

impl CopyConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        source: CopySource,
        dest: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            source,
            dest: dest.into(),
            branch: None,
            message: None,
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    fn file_name(&self) -> String {
        Path::new(&self.dest)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dest.clone())
    }

    fn parts(&self, content: &[u8], source_commit_id: Option<String>) -> Vec<FormPart> {
        let mut parts = vec![FormPart::file("content", self.file_name(), content.to_vec())];
        if let Some(branch) = &self.branch {
            parts.push(FormPart::text("branch", branch.as_str()));
        }
        if let Some(message) = &self.message {
            parts.push(FormPart::text("message", message.as_str()));
        }
        if let Some(id) = source_commit_id {
            parts.push(FormPart::text("sourceCommitId", id));
        }
        parts
    }
}

pub struct CopyUseCase {
    config: CopyConfig,
}

impl CopyUseCase {
    pub fn new(config: CopyConfig) -> Self {
        Self { config }
    }

    /// Id of the last commit that touched `dest` on the target branch.
    fn source_commit_id(&self, service: &BitbucketService) -> TaskResult<Option<String>> {
        let config = &self.config;
        let request = service.endpoints().latest_commit(
            &config.project_key,
            &config.repository,
            &config.dest,
            config.branch.as_deref(),
        );
        let commits = service.fetch(
            &request,
            &format!("latest commit of `{}`", config.dest),
            true,
        )?;
        Ok(commits
            .as_ref()
            .and_then(|page| str_at(page, "/values/0/id"))
            .map(str::to_string))
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let content = config.source.read()?;
        service.require_repository(key, slug)?;

        let remote = service.raw_file(key, slug, &config.dest, config.branch.as_deref())?;
        let up_to_date = remote.as_deref() == Some(content.as_slice());
        debug!(
            "{} in {key}/{slug}: remote present={}, up to date={}",
            config.dest,
            remote.is_some(),
            up_to_date
        );
        let current: Vec<Item> = remote
            .iter()
            .map(|bytes| json!({ "path": config.dest, "size": bytes.len() }))
            .collect();

        let desired = DesiredState::new(
            Presence::Present,
            format!("file `{}` of {key}/{slug}", config.dest),
            |_| true,
        )
        .satisfied_by(|_| up_to_date);

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            // Edits must name the commit they replace; a stale id is answered with 409.
            let source_commit_id = match existing {
                Some(_) => self.source_commit_id(service)?,
                None => None,
            };
            Ok(endpoints.edit_file(key, slug, &config.dest, config.parts(&content, source_commit_id)))
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("dest", config.dest.as_str())
            .with_field("branch", config.branch.clone());
        if let CopySource::File(path) = &config.source {
            outcome.set_field("src", path.display().to_string());
        }
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}
