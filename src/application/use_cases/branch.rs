use serde_json::Value;
use tracing::info;

use super::{record_reconcile, wildcard};
use crate::application::reconciler::{Action, DesiredState};
use crate::application::services::BitbucketService;
use crate::common::error::{Operation, TaskError};
use crate::common::result::TaskResult;
use crate::domain::entities::item::{bool_at, str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::presence::Presence;

/// Branches of `key/slug` whose name contains `filter` (all when `None`).
fn list_branches(
    service: &BitbucketService,
    key: &str,
    slug: &str,
    filter: Option<&str>,
) -> TaskResult<Vec<Item>> {
    let mut query = vec![("details", "false")];
    if let Some(filter) = filter {
        query.push(("filterText", filter));
    }
    service.list(
        &service.endpoints().branches(key, slug),
        &query,
        &format!("branches of repository {key}/{slug}"),
    )
}

fn is_named(item: &Item, branch: &BranchName) -> bool {
    str_at(item, "/displayId") == Some(branch.as_str())
}

fn is_default(item: &Item) -> bool {
    bool_at(item, "/isDefault").unwrap_or(false)
}

/// Settings for the `branch` task
#[derive(Debug, Clone)]
pub struct BranchConfig {
    pub project_key: String,
    pub repository: String,
    pub branch: BranchName,
    pub from_branch: BranchName,
    pub is_default: bool,
}

impl BranchConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        branch: impl AsRef<str>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            branch: BranchName::new(branch),
            from_branch: BranchName::new("master"),
            is_default: false,
        }
    }

    pub fn with_from_branch(mut self, from_branch: impl AsRef<str>) -> Self {
        self.from_branch = BranchName::new(from_branch);
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

pub struct BranchUseCase {
    config: BranchConfig,
}

impl BranchUseCase {
    pub fn new(config: BranchConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let current = list_branches(service, key, slug, Some(config.branch.as_str()))?;

        let branch = config.branch.clone();
        let want_default = config.is_default;
        let desired = DesiredState::new(
            Presence::Present,
            format!("branch `{}` of {key}/{slug}", config.branch),
            move |item| is_named(item, &branch),
        )
        .satisfied_by(move |item| !want_default || is_default(item));

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            Ok(match existing {
                None => endpoints.create_branch(key, slug, &config.branch, &config.from_branch),
                Some(_) => endpoints.set_default_branch(key, slug, &config.branch),
            })
        })?;

        if result.action == Action::Create && config.is_default && !service.check_mode() {
            info!("Making new branch {} the default of {}/{}", config.branch, key, slug);
            service.send(
                &endpoints.set_default_branch(key, slug, &config.branch),
                Operation::Update,
                &desired.entity,
            )?;
        }

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("branch", config.branch.as_str())
            .with_field("from_branch", config.from_branch.as_str())
            .with_field("is_default", config.is_default);
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Settings for the `branch-info` task
#[derive(Debug, Clone)]
pub struct BranchInfoConfig {
    pub project_key: String,
    pub repository: String,
    /// `filterText` values; `*` lists every branch
    pub filters: Vec<String>,
}

impl BranchInfoConfig {
    pub fn new(project_key: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            filters: vec!["*".to_string()],
        }
    }

    pub fn with_filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }
}

pub struct BranchInfoUseCase {
    config: BranchInfoConfig,
}

impl BranchInfoUseCase {
    pub fn new(config: BranchInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let (key, slug) = (self.config.project_key.as_str(), self.config.repository.as_str());
        let filters = wildcard(&self.config.filters);
        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("filter", filters.clone());

        if service.get_project(key, false)?.is_none() {
            outcome.push_message(format!("Project `{key}` does not exist."));
        }
        if service.get_repository(key, slug, false)?.is_none() {
            outcome.push_message(format!("Repository `{slug}` does not exist."));
        }

        let mut branches: Vec<Item> = Vec::new();
        if outcome.messages.is_empty() {
            if filters.iter().any(|f| f == "*") {
                branches = list_branches(service, key, slug, None)?;
            } else {
                for filter in &filters {
                    branches.extend(list_branches(service, key, slug, Some(filter))?);
                }
            }
        }

        outcome.set_field("branches", branches);
        Ok(outcome)
    }
}

/// Settings for the `default-branch` task
#[derive(Debug, Clone)]
pub struct DefaultBranchConfig {
    pub project_key: String,
    pub repository: String,
    pub branch: BranchName,
}

impl DefaultBranchConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        branch: impl AsRef<str>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            branch: BranchName::new(branch),
        }
    }
}

pub struct DefaultBranchUseCase {
    config: DefaultBranchConfig,
}

impl DefaultBranchUseCase {
    pub fn new(config: DefaultBranchConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        service.require_repository(key, slug)?;

        let current = list_branches(service, key, slug, Some(config.branch.as_str()))?;
        let entity = format!("Branch `{}` of {key}/{slug}", config.branch);
        if !current.iter().any(|item| is_named(item, &config.branch)) {
            return Err(TaskError::not_found(entity));
        }

        let branch = config.branch.clone();
        let desired = DesiredState::new(Presence::Present, entity, move |item| {
            is_named(item, &branch)
        })
        .satisfied_by(is_default);

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |_| {
            Ok(endpoints.set_default_branch(key, slug, &config.branch))
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("branch", config.branch.as_str())
            .with_field("isDefault", Value::Bool(true));
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}
