use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{record_reconcile, wildcard};
use crate::application::reconciler::{Action, DesiredState};
use crate::application::services::BitbucketService;
use crate::common::error::{Operation, TaskError};
use crate::common::result::{OptionExt, TaskResult};
use crate::domain::entities::item::{id_of, str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;
use crate::infrastructure::http::pagination::Page;

/// The applinks endpoint answers with a bare, unpaginated array.
fn list_application_links(service: &BitbucketService) -> TaskResult<Vec<Item>> {
    let response = service
        .executor()
        .execute(&service.endpoints().application_links())?;
    if response.status != 200 {
        return Err(TaskError::listing(
            response.status,
            "application links",
            response.error_message(),
        ));
    }
    Ok(response
        .json()
        .map(|body| Page::from_body(body).items)
        .unwrap_or_default())
}

fn refers_to(item: &Item, reference: &str) -> bool {
    id_of(item).as_deref() == Some(reference) || str_at(item, "/name") == Some(reference)
}

/// Incoming OAuth consumer of an application link.
#[derive(Debug, Clone, Default)]
pub struct ConsumerConfig {
    pub key: String,
    pub public_key: String,
    pub description: Option<String>,
    pub shared_secret: Option<String>,
    pub outgoing: bool,
    pub two_lo_allowed: bool,
    pub executing_two_lo_user: Option<String>,
    pub two_lo_impersonation_allowed: Option<bool>,
}

impl ConsumerConfig {
    pub fn new(key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            public_key: public_key.into(),
            ..Self::default()
        }
    }
}

/// Settings for the `application-link` task
#[derive(Debug, Clone)]
pub struct ApplicationLinkConfig {
    /// Existing link id; matched before the name
    pub id: Option<String>,
    pub name: String,
    pub rpc_url: Option<String>,
    pub display_url: Option<String>,
    pub consumer: Option<ConsumerConfig>,
    pub fail_when_not_exists: bool,
    pub state: Presence,
}

impl ApplicationLinkConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            rpc_url: None,
            display_url: None,
            consumer: None,
            fail_when_not_exists: false,
            state: Presence::Present,
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn with_urls(mut self, rpc_url: impl Into<String>, display_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self.display_url = Some(display_url.into());
        self
    }

    pub fn with_consumer(mut self, consumer: Option<ConsumerConfig>) -> Self {
        self.consumer = consumer;
        self
    }

    pub fn with_fail_when_not_exists(mut self, fail: bool) -> Self {
        self.fail_when_not_exists = fail;
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    fn matches(&self, item: &Item) -> bool {
        self.id.as_deref().is_some_and(|id| id_of(item).as_deref() == Some(id))
            || str_at(item, "/name") == Some(self.name.as_str())
    }

    fn satisfied_by(&self, item: &Item) -> bool {
        str_at(item, "/name") == Some(self.name.as_str())
            && str_at(item, "/rpcUrl") == self.rpc_url.as_deref()
            && str_at(item, "/displayUrl") == self.display_url.as_deref()
    }

    fn create_body(&self) -> TaskResult<Value> {
        self.link_body(None)
    }

    fn link_body(&self, id: Option<&str>) -> TaskResult<Value> {
        let rpc_url = self
            .rpc_url
            .as_deref()
            .ok_or_validation_error("rpc_url", "required when the state is present")?;
        let display_url = self
            .display_url
            .as_deref()
            .ok_or_validation_error("display_url", "required when the state is present")?;
        Ok(json!({
            "id": id,
            "name": self.name,
            "rpcUrl": rpc_url,
            "displayUrl": display_url,
            "typeId": "generic",
        }))
    }

    fn consumer_body(&self, consumer: &ConsumerConfig) -> Value {
        json!({
            "key": consumer.key,
            "name": self.name,
            "description": consumer.description,
            "sharedSecret": consumer.shared_secret,
            "publicKey": consumer.public_key,
            "outgoing": consumer.outgoing,
            "twoLOAllowed": consumer.two_lo_allowed,
            "executingTwoLOUser": consumer.executing_two_lo_user,
            "twoLOImpersonationAllowed": consumer.two_lo_impersonation_allowed,
        })
    }
}

/// Id of a freshly created link, read from the XML answer of the create call.
pub fn created_link_id(body: &str) -> TaskResult<Option<String>> {
    let pattern = Regex::new(r#"applicationlink/([^"/]+)"#)?;
    Ok(pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string()))
}

pub struct ApplicationLinkUseCase {
    config: ApplicationLinkConfig,
}

impl ApplicationLinkUseCase {
    pub fn new(config: ApplicationLinkConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        if config.state == Presence::Present {
            config.create_body()?;
        }

        let current = list_application_links(service)?;
        let desired = DesiredState::new(
            config.state,
            format!("application link `{}`", config.name),
            |item| config.matches(item),
        )
        .satisfied_by(|item| config.satisfied_by(item))
        .tolerate_missing(!config.fail_when_not_exists);

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            let Some(item) = existing else {
                return Ok(endpoints.create_application_link(config.create_body()?));
            };
            let id = id_of(item).ok_or_internal_error("listed application link has no id")?;
            match config.state {
                Presence::Absent => Ok(endpoints.delete_application_link(&id)),
                Presence::Present => Ok(endpoints
                    .update_application_link(&id, config.link_body(Some(id.as_str()))?)),
            }
        })?;

        let action = result.action;
        let result_body = result.object.clone();
        let mut outcome = TaskOutcome::unchanged().with_field("state", config.state.to_string());
        record_reconcile(&mut outcome, result);
        if service.check_mode() {
            return Ok(outcome);
        }

        let id = match action {
            Action::Create => {
                let id = match &result_body {
                    Some(Value::String(xml)) => created_link_id(xml)?,
                    Some(body) => id_of(body),
                    None => None,
                };
                let id = id.ok_or_internal_error("application link was created without an id")?;
                debug!("Created application link `{}` with id {}", config.name, id);
                outcome.set_field("json", json!({ "id": id, "name": config.name }));
                Some(id)
            }
            Action::Update => current
                .iter()
                .find(|item| config.matches(item))
                .and_then(id_of),
            Action::Delete | Action::None => None,
        };

        if let Some(id) = id {
            if let Some(consumer) = &config.consumer {
                info!("Configuring OAuth consumer `{}` for application link {}", consumer.key, id);
                service.send(
                    &endpoints.configure_application_link_consumer(&id, config.consumer_body(consumer)),
                    Operation::Update,
                    &format!("consumer of application link `{}`", config.name),
                )?;
            }
        }
        Ok(outcome)
    }
}

/// Settings for the `application-link-info` task
#[derive(Debug, Clone)]
pub struct ApplicationLinkInfoConfig {
    /// Link ids or names; `*` lists everything
    pub filters: Vec<String>,
}

pub struct ApplicationLinkInfoUseCase {
    config: ApplicationLinkInfoConfig,
}

impl ApplicationLinkInfoUseCase {
    pub fn new(config: ApplicationLinkInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let filters = wildcard(&self.config.filters);
        let all = list_application_links(service)?;
        let mut outcome = TaskOutcome::unchanged();

        if filters.iter().any(|f| f == "*") {
            outcome.set_field("application_links", all);
            return Ok(outcome);
        }

        let mut links = Vec::new();
        for filter in &filters {
            let found: Vec<&Item> = all.iter().filter(|item| refers_to(item, filter)).collect();
            match found.as_slice() {
                [] => outcome.push_message(format!("Application link `{filter}` does not exist")),
                [link] => links.push((*link).clone()),
                _ => outcome.push_message(format!(
                    "Application link `{filter}` matches {} links, refer to it by id",
                    found.len()
                )),
            }
        }
        outcome.set_field("application_links", links);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::bitbucket_service::testing::scripted_service;
    use crate::infrastructure::http::request::{Method, RawResponse};
    use crate::infrastructure::http::scripted::ScriptedExecutor;
    use pretty_assertions::assert_eq;

    const APPLINKS: &str = "/rest/applinks/3.0/applinks";
    const CREATE: &str = "/rest/applinks/3.0/applicationlink";
    const CREATED_XML: &str = r#"<?xml version="1.0"?><status><resources-created><link href="https://bb.example.com/rest/applinks/3.0/applicationlink/3b2d-77aa" rel="self"/></resources-created></status>"#;

    fn listed() -> Value {
        json!([
            {"id": "3b2d-77aa", "name": "Jira", "rpcUrl": "https://jira.example.com", "displayUrl": "https://jira.example.com"},
            {"id": "9f00-1234", "name": "Confluence", "rpcUrl": "https://wiki.example.com", "displayUrl": "https://wiki.example.com"}
        ])
    }

    fn jira() -> ApplicationLinkConfig {
        ApplicationLinkConfig::new("Jira").with_urls("https://jira.example.com", "https://jira.example.com")
    }

    #[test]
    fn test_extracts_created_id() {
        assert_eq!(created_link_id(CREATED_XML).unwrap().as_deref(), Some("3b2d-77aa"));
        assert_eq!(created_link_id("<status/>").unwrap(), None);
    }

    #[test]
    fn test_create_then_configure_consumer() {
        let scripted = ScriptedExecutor::new()
            .on(Method::Get, APPLINKS, 200, json!([]))
            .on_raw(Method::Put, CREATE, RawResponse::new(201, CREATED_XML))
            .on(
                Method::Put,
                "/rest/applinks-oauth/1.0/applicationlink/3b2d-77aa/authentication/consumer",
                201,
                Value::Null,
            );
        let (service, executor) = scripted_service(scripted, false);
        let outcome = ApplicationLinkUseCase::new(
            jira().with_consumer(Some(ConsumerConfig::new("bitbucket", "MIIB..."))),
        )
        .execute(&service)
        .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.field("json"), Some(&json!({"id": "3b2d-77aa", "name": "Jira"})));
        let mutations = executor.mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0].json_body().unwrap()["typeId"], "generic");
        assert_eq!(mutations[1].json_body().unwrap()["publicKey"], "MIIB...");
    }

    #[test]
    fn test_present_requires_urls() {
        let (service, executor) = scripted_service(ScriptedExecutor::new(), false);
        let error = ApplicationLinkUseCase::new(ApplicationLinkConfig::new("Jira"))
            .execute(&service)
            .unwrap_err();
        assert!(matches!(error, TaskError::Validation { .. }));
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn test_matching_link_is_noop() {
        let scripted = ScriptedExecutor::new().on(Method::Get, APPLINKS, 200, listed());
        let (service, executor) = scripted_service(scripted, false);
        let outcome = ApplicationLinkUseCase::new(jira()).execute(&service).unwrap();
        assert!(!outcome.changed);
        assert!(executor.mutations().is_empty());
    }

    #[test]
    fn test_drifted_urls_are_updated_then_settle() {
        let stale = json!([
            {"id": "3b2d-77aa", "name": "Jira", "rpcUrl": "https://old.example.com", "displayUrl": "https://old.example.com"}
        ]);
        let consumer = "/rest/applinks-oauth/1.0/applicationlink/3b2d-77aa/authentication/consumer";
        let scripted = ScriptedExecutor::new()
            .on(Method::Get, APPLINKS, 200, stale)
            .on(Method::Get, APPLINKS, 200, listed())
            .on(Method::Put, &format!("{CREATE}/3b2d-77aa"), 200, Value::Null)
            .on(Method::Put, consumer, 201, Value::Null);
        let (service, executor) = scripted_service(scripted, false);
        let task = ApplicationLinkUseCase::new(
            jira().with_consumer(Some(ConsumerConfig::new("bitbucket", "MIIB..."))),
        );

        let first = task.execute(&service).unwrap();
        assert!(first.changed);
        assert_eq!(first.field("action"), Some(&json!("update")));
        let mutations = executor.mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0].url.path(), format!("{CREATE}/3b2d-77aa"));
        assert_eq!(
            mutations[0].json_body().unwrap()["rpcUrl"],
            "https://jira.example.com"
        );
        assert_eq!(mutations[1].url.path(), consumer);

        let second = task.execute(&service).unwrap();
        assert!(!second.changed);
        assert_eq!(executor.mutations().len(), 2);
    }

    #[test]
    fn test_drifted_urls_in_check_mode() {
        let stale = json!([
            {"id": "3b2d-77aa", "name": "Jira", "rpcUrl": "https://old.example.com", "displayUrl": "https://old.example.com"}
        ]);
        let scripted = ScriptedExecutor::new().on(Method::Get, APPLINKS, 200, stale);
        let (service, executor) = scripted_service(scripted, true);
        let outcome = ApplicationLinkUseCase::new(jira()).execute(&service).unwrap();
        assert!(outcome.changed);
        assert!(executor.mutations().is_empty());
    }

    #[test]
    fn test_missing_link_on_delete_is_recorded() {
        let scripted = ScriptedExecutor::new()
            .on(Method::Get, APPLINKS, 200, listed())
            .on(Method::Delete, &format!("{APPLINKS}/3b2d-77aa"), 404, json!({"errors": [{"message": "gone"}]}));
        let (service, _) = scripted_service(scripted, false);
        let outcome = ApplicationLinkUseCase::new(ApplicationLinkConfig::new("Jira").with_state(Presence::Absent))
            .execute(&service)
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.field("errors").unwrap()[0]["status"], 404);
    }

    #[test]
    fn test_info_filters() {
        let scripted = ScriptedExecutor::new().on(Method::Get, APPLINKS, 200, listed());
        let (service, _) = scripted_service(scripted, false);
        let outcome = ApplicationLinkInfoUseCase::new(ApplicationLinkInfoConfig {
            filters: vec!["9f00-1234".into(), "Bamboo".into()],
        })
        .execute(&service)
        .unwrap();
        let links = outcome.field("application_links").unwrap().as_array().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["name"], "Confluence");
        assert_eq!(outcome.messages, vec!["Application link `Bamboo` does not exist"]);
    }
}
