use serde_json::{json, Value};

use super::record_reconcile;
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::result::{OptionExt, TaskResult};
use crate::domain::entities::item::{bool_at, id_of, str_at, strings_in, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

fn list_webhooks(service: &BitbucketService, key: &str, slug: &str) -> TaskResult<Vec<Item>> {
    service.list(
        &service.endpoints().webhooks(key, slug),
        &[],
        &format!("webhooks of repository {key}/{slug}"),
    )
}

/// Settings for the `webhook` task
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub project_key: String,
    pub repository: String,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub active: bool,
    pub state: Presence,
}

impl WebhookConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            name: name.into(),
            url: url.into(),
            events: vec!["repo:refs_changed".to_string()],
            active: true,
            state: Presence::Present,
        }
    }

    pub fn with_events(mut self, events: Vec<String>) -> Self {
        self.events = events;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    fn body(&self) -> Value {
        json!({
            "name": self.name,
            "url": self.url,
            "events": self.events,
            "active": self.active,
        })
    }

    fn satisfied_by(&self, item: &Item) -> bool {
        let mut listed: Vec<&str> = strings_in(item, "/events", "");
        let mut wanted: Vec<&str> = self.events.iter().map(String::as_str).collect();
        listed.sort_unstable();
        listed.dedup();
        wanted.sort_unstable();
        wanted.dedup();
        str_at(item, "/url") == Some(self.url.as_str())
            && bool_at(item, "/active").unwrap_or(true) == self.active
            && listed == wanted
    }
}

pub struct WebhookUseCase {
    config: WebhookConfig,
}

impl WebhookUseCase {
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        service.require_repository(key, slug)?;

        let current = list_webhooks(service, key, slug)?;
        let name = config.name.clone();
        let desired = DesiredState::new(
            config.state,
            format!("webhook `{}` of {key}/{slug}", config.name),
            move |item| str_at(item, "/name") == Some(name.as_str()),
        )
        .satisfied_by(|item| config.satisfied_by(item));

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            let Some(item) = existing else {
                return Ok(endpoints.create_webhook(key, slug, config.body()));
            };
            let id = id_of(item).ok_or_internal_error("listed webhook has no id")?;
            Ok(match config.state {
                Presence::Present => endpoints.update_webhook(key, slug, &id, config.body()),
                Presence::Absent => endpoints.delete_webhook(key, slug, &id),
            })
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("state", config.state.to_string())
            .with_field("webhook_name", config.name.as_str())
            .with_field("parsed_event", config.events.clone());
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Settings for the `webhook-info` task
#[derive(Debug, Clone)]
pub struct WebhookInfoConfig {
    pub project_key: String,
    pub repository: String,
}

pub struct WebhookInfoUseCase {
    config: WebhookInfoConfig,
}

impl WebhookInfoUseCase {
    pub fn new(config: WebhookInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let (key, slug) = (self.config.project_key.as_str(), self.config.repository.as_str());
        service.require_repository(key, slug)?;
        let webhooks = list_webhooks(service, key, slug)?;
        Ok(TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("webhooks", webhooks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::bitbucket_service::testing::scripted_service;
    use crate::infrastructure::http::request::Method;
    use crate::infrastructure::http::scripted::ScriptedExecutor;
    use pretty_assertions::assert_eq;

    const WEBHOOKS: &str = "/rest/api/1.0/projects/FOO/repos/bar/webhooks";

    fn repository(webhooks: Value) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .on(Method::Get, "/rest/api/1.0/projects/FOO", 200, json!({"key": "FOO"}))
            .on(
                Method::Get,
                "/rest/api/1.0/projects/FOO/repos/bar",
                200,
                json!({"slug": "bar"}),
            )
            .on(Method::Get, WEBHOOKS, 200, ScriptedExecutor::page(webhooks))
    }

    fn jenkins() -> WebhookConfig {
        WebhookConfig::new("FOO", "bar", "jenkins", "https://ci.example.com/hook")
            .with_events(vec!["repo:refs_changed".into(), "pr:merged".into()])
    }

    #[test]
    fn test_creates_webhook() {
        let scripted = repository(json!([])).on(Method::Post, WEBHOOKS, 201, json!({"id": 9}));
        let (service, executor) = scripted_service(scripted, false);
        let outcome = WebhookUseCase::new(jenkins()).execute(&service).unwrap();

        assert!(outcome.changed);
        assert_eq!(
            executor.mutations()[0].json_body(),
            Some(&json!({
                "name": "jenkins",
                "url": "https://ci.example.com/hook",
                "events": ["repo:refs_changed", "pr:merged"],
                "active": true
            }))
        );
    }

    #[test]
    fn test_same_events_in_other_order_is_noop() {
        let scripted = repository(json!([{
            "id": 9,
            "name": "jenkins",
            "url": "https://ci.example.com/hook",
            "events": ["pr:merged", "repo:refs_changed"],
            "active": true
        }]));
        let (service, executor) = scripted_service(scripted, false);
        let outcome = WebhookUseCase::new(jenkins()).execute(&service).unwrap();
        assert!(!outcome.changed);
        assert!(executor.mutations().is_empty());
    }

    #[test]
    fn test_changed_url_is_updated() {
        let scripted = repository(json!([{
            "id": 9,
            "name": "jenkins",
            "url": "https://old.example.com/hook",
            "events": ["pr:merged", "repo:refs_changed"],
            "active": true
        }]))
        .on(Method::Put, "/rest/api/1.0/projects/FOO/repos/bar/webhooks/9", 200, json!({"id": 9}));
        let (service, executor) = scripted_service(scripted, false);
        let outcome = WebhookUseCase::new(jenkins()).execute(&service).unwrap();
        assert!(outcome.changed);
        assert_eq!(executor.mutations()[0].method, Method::Put);
    }

    #[test]
    fn test_absent_deletes() {
        let scripted = repository(json!([{"id": 9, "name": "jenkins"}])).on(
            Method::Delete,
            "/rest/api/1.0/projects/FOO/repos/bar/webhooks/9",
            204,
            Value::Null,
        );
        let (service, executor) = scripted_service(scripted, false);
        let outcome = WebhookUseCase::new(jenkins().with_state(Presence::Absent))
            .execute(&service)
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(executor.mutations().len(), 1);
    }
}
