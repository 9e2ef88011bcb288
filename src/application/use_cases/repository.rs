use serde_json::json;

use super::{record_reconcile, wildcard};
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::result::TaskResult;
use crate::domain::entities::item::{str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

/// Settings for the `repo` task
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub project_key: String,
    pub repository: String,
    pub state: Presence,
}

impl RepositoryConfig {
    pub fn new(project_key: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            state: Presence::Present,
        }
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }
}

pub struct RepositoryUseCase {
    config: RepositoryConfig,
}

impl RepositoryUseCase {
    pub fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        service.require_project(&config.project_key)?;

        let current: Vec<Item> = service
            .get_repository(&config.project_key, &config.repository, false)?
            .into_iter()
            .collect();
        let wanted = config.repository.to_lowercase();
        let desired = DesiredState::new(
            config.state,
            format!("repository `{}/{}`", config.project_key, config.repository),
            move |item| {
                [str_at(item, "/slug"), str_at(item, "/name")]
                    .iter()
                    .flatten()
                    .any(|value| value.to_lowercase() == wanted)
            },
        );

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            Ok(match existing {
                None => endpoints.create_repository(
                    &config.project_key,
                    json!({ "name": config.repository }),
                ),
                Some(item) => endpoints.delete_repository(
                    &config.project_key,
                    str_at(item, "/slug").unwrap_or(&config.repository),
                ),
            })
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", config.project_key.as_str())
            .with_field("repository", config.repository.as_str())
            .with_field("state", config.state.to_string());
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Settings for the `repo-info` task
#[derive(Debug, Clone)]
pub struct RepositoryInfoConfig {
    pub project_key: String,
    /// Repository slugs; `*` lists the whole project
    pub repositories: Vec<String>,
}

impl RepositoryInfoConfig {
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            repositories: vec!["*".to_string()],
        }
    }

    pub fn with_repositories(mut self, repositories: Vec<String>) -> Self {
        self.repositories = repositories;
        self
    }
}

pub struct RepositoryInfoUseCase {
    config: RepositoryInfoConfig,
}

impl RepositoryInfoUseCase {
    pub fn new(config: RepositoryInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let key = &self.config.project_key;
        let filters = wildcard(&self.config.repositories);
        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key.as_str())
            .with_field("filter", filters.clone());

        let mut repositories = Vec::new();
        if service.get_project(key, false)?.is_none() {
            outcome.push_message(format!("Project `{key}` does not exist."));
        } else if filters.iter().any(|f| f == "*") {
            repositories = service.list(
                &service.endpoints().repositories(key),
                &[],
                &format!("repositories of project {key}"),
            )?;
        } else {
            for slug in &filters {
                match service.get_repository(key, slug, false)? {
                    Some(repository) => repositories.push(repository),
                    None => outcome.push_message(format!("Repository `{slug}` does not exist.")),
                }
            }
        }

        outcome.set_field("repositories", repositories);
        Ok(outcome)
    }
}
