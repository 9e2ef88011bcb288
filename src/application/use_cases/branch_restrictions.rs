use serde_json::{json, Value};

use crate::application::reconciler::{DesiredState, ReconcileResult};
use crate::application::services::BitbucketService;
use crate::common::result::{OptionExt, TaskResult};
use crate::domain::entities::item::{id_of, same_names, str_at, strings_in, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;
use crate::domain::value_objects::restriction::{BranchMatcher, RestrictionKind};
use crate::infrastructure::http::endpoints::RestrictionScope;

/// One restriction and who is exempt from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionSpec {
    pub kind: RestrictionKind,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub access_keys: Vec<String>,
}

impl RestrictionSpec {
    pub fn new(kind: RestrictionKind) -> Self {
        Self {
            kind,
            users: Vec::new(),
            groups: Vec::new(),
            access_keys: Vec::new(),
        }
    }

    pub fn with_users(mut self, users: Vec<String>) -> Self {
        self.users = users;
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_access_keys(mut self, access_keys: Vec<String>) -> Self {
        self.access_keys = access_keys;
        self
    }

    fn body(&self, matcher: &BranchMatcher) -> Value {
        let access_keys: Vec<Value> = self
            .access_keys
            .iter()
            .map(|key| match key.parse::<i64>() {
                Ok(id) => json!(id),
                Err(_) => json!(key),
            })
            .collect();
        json!({
            "type": self.kind.type_id(),
            "matcher": matcher.to_json(),
            "users": self.users,
            "groups": self.groups,
            "accessKeys": access_keys,
        })
    }

    /// Exemptions of a listed restriction equal these, ignoring case and order.
    fn exemptions_match(&self, item: &Item) -> bool {
        let users = strings_in(item, "/users", "/name");
        let groups = strings_in(item, "/groups", "");
        same_names(&users, &self.users)
            && same_names(&groups, &self.groups)
            && same_names(&listed_access_keys(item), &self.access_keys)
    }
}

/// Access keys are listed either as bare ids or as `{"key": {"id": ..}}` objects.
fn listed_access_keys(item: &Item) -> Vec<String> {
    item.get("accessKeys")
        .and_then(Value::as_array)
        .map(|keys| {
            keys.iter()
                .filter_map(|key| {
                    let id = key.pointer("/key/id").unwrap_or(key);
                    match id {
                        Value::Number(n) => Some(n.to_string()),
                        Value::String(s) => Some(s.clone()),
                        _ => None,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Settings for the `branch-permissions` task
#[derive(Debug, Clone)]
pub struct BranchRestrictionsConfig {
    pub project_key: String,
    /// Restrict a single repository instead of the whole project
    pub repository: Option<String>,
    pub matcher: BranchMatcher,
    pub restrictions: Vec<RestrictionSpec>,
    pub state: Presence,
}

impl BranchRestrictionsConfig {
    pub fn new(project_key: impl Into<String>, matcher: BranchMatcher) -> Self {
        Self {
            project_key: project_key.into(),
            repository: None,
            matcher,
            restrictions: Vec::new(),
            state: Presence::Present,
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_restriction(mut self, restriction: RestrictionSpec) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    fn scope(&self) -> RestrictionScope {
        RestrictionScope::new(&self.project_key, self.repository.as_deref())
    }
}

pub struct BranchRestrictionsUseCase {
    config: BranchRestrictionsConfig,
}

impl BranchRestrictionsUseCase {
    pub fn new(config: BranchRestrictionsConfig) -> Self {
        Self { config }
    }

    fn reconcile_one(
        &self,
        service: &BitbucketService,
        scope: &RestrictionScope,
        current: &[Item],
        restriction: &RestrictionSpec,
    ) -> TaskResult<ReconcileResult> {
        let config = &self.config;
        let type_id = restriction.kind.type_id();
        let scope_type = scope.type_id();
        let desired = DesiredState::new(
            config.state,
            format!("{} restriction on {}", type_id, config.matcher),
            |item| {
                str_at(item, "/type") == Some(type_id)
                    && item
                        .get("matcher")
                        .map(|m| config.matcher.is_same(m))
                        .unwrap_or(false)
                    && str_at(item, "/scope/type").map_or(true, |t| t == scope_type)
            },
        )
        .satisfied_by(|item| restriction.exemptions_match(item));

        let endpoints = service.endpoints();
        service.reconciler().reconcile(&desired, current, |existing| {
            match (config.state, existing) {
                (Presence::Absent, Some(item)) => {
                    let id = id_of(item).ok_or_internal_error("listed restriction has no id")?;
                    Ok(endpoints.delete_restriction(scope, &id))
                }
                _ => Ok(endpoints.create_restriction(scope, restriction.body(&config.matcher))),
            }
        })
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let key = config.project_key.as_str();
        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("state", config.state.to_string())
            .with_field("matcher", config.matcher.to_json());
        if let Some(slug) = &config.repository {
            outcome.set_field("repository", slug.as_str());
        }

        if service.get_project(key, false)?.is_none() {
            outcome.push_message(format!("Project `{key}` does not exist."));
            return Ok(outcome);
        }
        if let Some(slug) = &config.repository {
            if service.get_repository(key, slug, false)?.is_none() {
                outcome.push_message(format!("Repository `{slug}` does not exist."));
                return Ok(outcome);
            }
        }

        let scope = config.scope();
        let current = service.list(
            &service.endpoints().restrictions(&scope),
            &[],
            &format!("branch restrictions of {}", scope_label(&scope)),
        )?;

        let mut results = Vec::new();
        for restriction in &config.restrictions {
            let result = self.reconcile_one(service, &scope, &current, restriction)?;
            outcome.mark_changed(result.changed);
            results.push(json!({
                "type": restriction.kind.type_id(),
                "action": result.action,
                "json": result.object.unwrap_or_else(|| json!({})),
            }));
        }

        outcome.set_field("results", results);
        Ok(outcome)
    }
}

fn scope_label(scope: &RestrictionScope) -> String {
    match scope {
        RestrictionScope::Project(key) => format!("project {key}"),
        RestrictionScope::Repository(key, slug) => format!("repository {key}/{slug}"),
    }
}

/// Settings for the `branch-permissions-info` task
#[derive(Debug, Clone)]
pub struct BranchRestrictionsInfoConfig {
    pub project_key: String,
    pub repository: Option<String>,
}

pub struct BranchRestrictionsInfoUseCase {
    config: BranchRestrictionsInfoConfig,
}

impl BranchRestrictionsInfoUseCase {
    pub fn new(config: BranchRestrictionsInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let key = self.config.project_key.as_str();
        let mut outcome = TaskOutcome::unchanged().with_field("project_key", key);
        if let Some(slug) = &self.config.repository {
            outcome.set_field("repository", slug.as_str());
        }

        let mut restrictions = Vec::new();
        let missing_repository = match self.config.repository.as_deref() {
            Some(slug) => service.get_repository(key, slug, false)?.is_none(),
            None => false,
        };
        if service.get_project(key, false)?.is_none() {
            outcome.push_message(format!("Project `{key}` does not exist."));
        } else if missing_repository {
            outcome.push_message(format!(
                "Repository `{}` does not exist.",
                self.config.repository.as_deref().unwrap_or_default()
            ));
        } else {
            let scope = RestrictionScope::new(key, self.config.repository.as_deref());
            restrictions = service.list(
                &service.endpoints().restrictions(&scope),
                &[],
                &format!("branch restrictions of {}", scope_label(&scope)),
            )?;
        }

        outcome.set_field("restrictions", restrictions);
        Ok(outcome)
    }
}
