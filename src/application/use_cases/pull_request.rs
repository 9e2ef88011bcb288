use serde_json::{json, Value};

use super::record_reconcile;
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::result::{OptionExt, TaskResult};
use crate::domain::entities::item::{i64_at, id_of, str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::presence::Presence;

fn list_pull_requests(service: &BitbucketService, key: &str, slug: &str) -> TaskResult<Vec<Item>> {
    service.list(
        &service.endpoints().pull_requests(key, slug),
        &[],
        &format!("pull requests of repository {key}/{slug}"),
    )
}

/// Settings for the `pull-request` task
#[derive(Debug, Clone)]
pub struct PullRequestConfig {
    pub project_key: String,
    pub repository: String,
    pub from_branch: BranchName,
    pub to_branch: BranchName,
    pub title: String,
    /// Defaults to the title
    pub description: Option<String>,
    pub reviewers: Vec<String>,
    pub state: Presence,
}

impl PullRequestConfig {
    pub fn new(project_key: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            from_branch: BranchName::new("develop"),
            to_branch: BranchName::new("master"),
            title: String::new(),
            description: None,
            reviewers: Vec::new(),
            state: Presence::Present,
        }
    }

    pub fn with_branches(mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> Self {
        self.from_branch = BranchName::new(from);
        self.to_branch = BranchName::new(to);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_reviewers(mut self, reviewers: Vec<String>) -> Self {
        self.reviewers = reviewers;
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    fn git_ref(&self, branch: &BranchName) -> Value {
        json!({
            "id": branch.to_ref(),
            "repository": {
                "slug": self.repository,
                "project": { "key": self.project_key },
            },
        })
    }

    fn body(&self) -> Value {
        let reviewers: Vec<Value> = self
            .reviewers
            .iter()
            .map(|name| json!({ "user": { "name": name } }))
            .collect();
        json!({
            "title": self.title,
            "description": self.description.as_deref().unwrap_or(&self.title),
            "state": "OPEN",
            "open": true,
            "closed": false,
            "fromRef": self.git_ref(&self.from_branch),
            "toRef": self.git_ref(&self.to_branch),
            "locked": false,
            "reviewers": reviewers,
        })
    }
}

pub struct PullRequestUseCase {
    config: PullRequestConfig,
}

impl PullRequestUseCase {
    pub fn new(config: PullRequestConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        service.require_repository(key, slug)?;

        let current = list_pull_requests(service, key, slug)?;
        let (from, to) = (config.from_branch.as_str(), config.to_branch.as_str());
        let desired = DesiredState::new(
            config.state,
            format!("pull request {from} -> {to} of {key}/{slug}"),
            |item| {
                str_at(item, "/fromRef/displayId") == Some(from)
                    && str_at(item, "/toRef/displayId") == Some(to)
            },
        );

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            match existing {
                None => Ok(endpoints.create_pull_request(key, slug, config.body())),
                Some(item) => {
                    let id = id_of(item).ok_or_internal_error("listed pull request has no id")?;
                    let version = i64_at(item, "/version").unwrap_or(0);
                    Ok(endpoints.delete_pull_request(key, slug, &id, version))
                }
            }
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("state", config.state.to_string());
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Settings for the `pull-request-info` task
#[derive(Debug, Clone)]
pub struct PullRequestInfoConfig {
    pub project_key: String,
    pub repository: String,
}

pub struct PullRequestInfoUseCase {
    config: PullRequestInfoConfig,
}

impl PullRequestInfoUseCase {
    pub fn new(config: PullRequestInfoConfig) -> Self {
        Self { config }
    }

    fn summarize(item: &Item) -> Value {
        json!({
            "pull_id": item.get("id"),
            "version": item.get("version"),
            "author": str_at(item, "/author/user/name"),
            "title": item.get("title"),
            "fromRef": str_at(item, "/fromRef/displayId"),
            "toRef": str_at(item, "/toRef/displayId"),
            "reviewers": item.get("reviewers"),
        })
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let (key, slug) = (self.config.project_key.as_str(), self.config.repository.as_str());
        service.require_repository(key, slug)?;
        let pulls: Vec<Value> = list_pull_requests(service, key, slug)?
            .iter()
            .map(Self::summarize)
            .collect();
        Ok(TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("pull_requests", pulls))
    }
}
