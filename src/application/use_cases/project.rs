use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use super::{record_reconcile, wildcard};
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::error::TaskError;
use crate::common::result::{ResultExt, TaskResult};
use crate::domain::entities::item::{str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

/// Settings for the `project` task
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// PNG file sent as a data URI
    pub avatar: Option<PathBuf>,
    pub state: Presence,
}

impl ProjectConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            description: None,
            avatar: None,
            state: Presence::Present,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<PathBuf>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }
}

pub struct ProjectUseCase {
    config: ProjectConfig,
}

impl ProjectUseCase {
    pub fn new(config: ProjectConfig) -> Self {
        Self { config }
    }

    fn body(&self, name: &str, description: &str) -> TaskResult<Value> {
        let mut body = json!({
            "key": self.config.key,
            "name": name,
            "description": description,
        });
        if let Some(path) = &self.config.avatar {
            let bytes = std::fs::read(path)
                .with_filesystem_error("Failed to read project avatar", Some(path.clone()))?;
            body["avatar"] = Value::String(format!(
                "data:image/png;base64,{}",
                STANDARD.encode(bytes)
            ));
        }
        Ok(body)
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (name, description) = match (config.state, &config.name, &config.description) {
            (Presence::Present, Some(name), Some(description)) => {
                (name.as_str(), description.as_str())
            }
            (Presence::Present, None, _) => {
                return Err(TaskError::validation_error(
                    "name",
                    "a project name is required when state is present",
                    None,
                ))
            }
            (Presence::Present, _, None) => {
                return Err(TaskError::validation_error(
                    "description",
                    "a project description is required when state is present",
                    None,
                ))
            }
            (Presence::Absent, _, _) => ("", ""),
        };

        let current: Vec<Item> = service.get_project(&config.key, false)?.into_iter().collect();
        // Project keys are case-insensitive on the server.
        let key = config.key.clone();
        let desired = DesiredState::new(config.state, format!("project `{}`", config.key), move |item| {
            str_at(item, "/key").is_some_and(|listed| listed.eq_ignore_ascii_case(&key))
        })
        .satisfied_by(|item| {
            str_at(item, "/name") == Some(name)
                && str_at(item, "/description").unwrap_or_default() == description
        });

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            let key = existing
                .and_then(|item| str_at(item, "/key"))
                .unwrap_or(config.key.as_str());
            match (config.state, existing) {
                (Presence::Present, None) => Ok(endpoints.create_project(self.body(name, description)?)),
                (Presence::Present, Some(_)) => Ok(endpoints.update_project(
                    key,
                    json!({ "name": name, "description": description }),
                )),
                (Presence::Absent, _) => Ok(endpoints.delete_project(key)),
            }
        })?;
        info!("project {}: {}", config.key, result.action);

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", config.key.as_str())
            .with_field("state", config.state.to_string());
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Settings for the `project-info` task
#[derive(Debug, Clone)]
pub struct ProjectInfoConfig {
    /// Keys to look up; `*` lists every project
    pub keys: Vec<String>,
}

impl Default for ProjectInfoConfig {
    fn default() -> Self {
        Self {
            keys: vec!["*".to_string()],
        }
    }
}

impl ProjectInfoConfig {
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }
}

pub struct ProjectInfoUseCase {
    config: ProjectInfoConfig,
}

impl ProjectInfoUseCase {
    pub fn new(config: ProjectInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let keys = wildcard(&self.config.keys);
        let mut outcome = TaskOutcome::unchanged().with_field("filter", keys.clone());

        let projects = if keys.iter().any(|k| k == "*") {
            service.list(&service.endpoints().projects(), &[], "projects")?
        } else {
            let mut found = Vec::new();
            for key in &keys {
                match service.get_project(key, false)? {
                    Some(project) => found.push(project),
                    None => outcome.push_message(format!("Project `{key}` does not exist.")),
                }
            }
            found
        };

        outcome.set_field("projects", projects);
        Ok(outcome)
    }
}
