use url::Url;

use super::{record_reconcile, wildcard};
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::result::TaskResult;
use crate::domain::entities::item::{str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::permission::{Grantee, PermissionScope, RepositoryPermission};
use crate::domain::value_objects::presence::Presence;

/// Entries of one permission collection, optionally narrowed by the server `filter`.
fn list_permissions(
    service: &BitbucketService,
    url: &Url,
    filter: Option<&str>,
    context: &str,
) -> TaskResult<Vec<Item>> {
    match filter {
        Some(filter) => service.list(url, &[("filter", filter)], context),
        None => service.list(url, &[], context),
    }
}

/// Settings for the `repo-permissions` task
#[derive(Debug, Clone)]
pub struct RepositoryPermissionsConfig {
    pub project_key: String,
    pub repository: String,
    pub grantee: Grantee,
    /// `None` revokes every permission of the grantee
    pub permission: Option<RepositoryPermission>,
}

impl RepositoryPermissionsConfig {
    pub fn new(
        project_key: impl Into<String>,
        repository: impl Into<String>,
        grantee: Grantee,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            grantee,
            permission: None,
        }
    }

    pub fn with_permission(mut self, permission: Option<RepositoryPermission>) -> Self {
        self.permission = permission;
        self
    }
}

pub struct RepositoryPermissionsUseCase {
    config: RepositoryPermissionsConfig,
}

impl RepositoryPermissionsUseCase {
    pub fn new(config: RepositoryPermissionsConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let grantee = &config.grantee;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field(grantee.scope().entry_key(), grantee.name())
            .with_field(
                "permission",
                config.permission.map(|p| p.as_str()).unwrap_or_default(),
            );

        if service.get_project(key, false)?.is_none() {
            outcome.push_message(format!("Project `{key}` does not exist."));
            return Ok(outcome);
        }
        if service.get_repository(key, slug, false)?.is_none() {
            outcome.push_message(format!("Repository `{slug}` does not exist."));
            return Ok(outcome);
        }

        let mut current = Vec::new();
        for scope in PermissionScope::ALL {
            current.extend(list_permissions(
                service,
                &service.endpoints().repository_permissions(key, slug, scope),
                Some(grantee.name()),
                &format!("{scope} permissions of repository {key}/{slug}"),
            )?);
        }

        let entry_pointer = format!("/{}/name", grantee.scope().entry_key());
        let wanted = grantee.name().to_lowercase();
        let presence = match config.permission {
            Some(_) => Presence::Present,
            None => Presence::Absent,
        };
        let desired = DesiredState::new(
            presence,
            format!("{grantee} permission on {key}/{slug}"),
            move |item| {
                str_at(item, &entry_pointer).map(str::to_lowercase).as_deref() == Some(wanted.as_str())
            },
        )
        .satisfied_by(|item| {
            let listed = str_at(item, "/permission").map(str::to_uppercase);
            listed.as_deref() == config.permission.map(|p| p.as_str())
        });

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |_| {
            Ok(match config.permission {
                Some(permission) => {
                    endpoints.grant_repository_permission(key, slug, grantee, permission.as_str())
                }
                None => endpoints.revoke_repository_permission(key, slug, grantee),
            })
        })?;

        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}

/// Where a permissions listing is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionsTarget {
    Project(String),
    Repository(String, String),
}

/// Settings for the `project-permissions-info` and `repo-permissions-info` tasks
#[derive(Debug, Clone)]
pub struct PermissionsInfoConfig {
    pub target: PermissionsTarget,
    /// Server-side name filters; `*` lists every entry
    pub filters: Vec<String>,
}

impl PermissionsInfoConfig {
    pub fn project(project_key: impl Into<String>) -> Self {
        Self {
            target: PermissionsTarget::Project(project_key.into()),
            filters: vec!["*".to_string()],
        }
    }

    pub fn repository(project_key: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            target: PermissionsTarget::Repository(project_key.into(), repository.into()),
            filters: vec!["*".to_string()],
        }
    }

    pub fn with_filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }
}

pub struct PermissionsInfoUseCase {
    config: PermissionsInfoConfig,
}

impl PermissionsInfoUseCase {
    pub fn new(config: PermissionsInfoConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let filters = wildcard(&self.config.filters);
        let mut outcome = TaskOutcome::unchanged().with_field("filters", filters.clone());

        let (key, slug) = match &self.config.target {
            PermissionsTarget::Project(key) => (key.as_str(), None),
            PermissionsTarget::Repository(key, slug) => (key.as_str(), Some(slug.as_str())),
        };
        outcome.set_field("project_key", key);
        if let Some(slug) = slug {
            outcome.set_field("repository", slug);
        }

        let mut missing = service.get_project(key, false)?.is_none();
        if missing {
            outcome.push_message(format!("Project `{key}` does not exist."));
        } else if let Some(slug) = slug {
            missing = service.get_repository(key, slug, false)?.is_none();
            if missing {
                outcome.push_message(format!("Repository `{slug}` does not exist."));
            }
        }

        let mut users = Vec::new();
        let mut groups = Vec::new();
        if !missing {
            let wanted: Vec<Option<&str>> = if filters.iter().any(|f| f == "*") {
                vec![None]
            } else {
                filters.iter().map(|f| Some(f.as_str())).collect()
            };
            for scope in PermissionScope::ALL {
                let (url, context) = match slug {
                    Some(slug) => (
                        service.endpoints().repository_permissions(key, slug, scope),
                        format!("{scope} permissions of repository {key}/{slug}"),
                    ),
                    None => (
                        service.endpoints().project_permissions(key, scope),
                        format!("{scope} permissions of project {key}"),
                    ),
                };
                let bucket = match scope {
                    PermissionScope::Users => &mut users,
                    PermissionScope::Groups => &mut groups,
                };
                for filter in &wanted {
                    bucket.extend(list_permissions(service, &url, *filter, &context)?);
                }
            }
        }

        outcome.set_field("users", users);
        outcome.set_field("groups", groups);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::bitbucket_service::testing::scripted_service;
    use crate::infrastructure::http::request::Method;
    use crate::infrastructure::http::scripted::ScriptedExecutor;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    const USERS: &str = "/rest/api/1.0/projects/FOO/repos/bar/permissions/users";
    const GROUPS: &str = "/rest/api/1.0/projects/FOO/repos/bar/permissions/groups";

    fn repository(users: Value, groups: Value) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .on(Method::Get, "/rest/api/1.0/projects/FOO", 200, json!({"key": "FOO"}))
            .on(
                Method::Get,
                "/rest/api/1.0/projects/FOO/repos/bar",
                200,
                json!({"slug": "bar"}),
            )
            .on(Method::Get, USERS, 200, ScriptedExecutor::page(users))
            .on(Method::Get, GROUPS, 200, ScriptedExecutor::page(groups))
    }

    fn grant(grantee: Grantee, permission: Option<RepositoryPermission>) -> RepositoryPermissionsUseCase {
        RepositoryPermissionsUseCase::new(
            RepositoryPermissionsConfig::new("FOO", "bar", grantee).with_permission(permission),
        )
    }

    #[test]
    fn test_grants_missing_user_permission() {
        let scripted = repository(json!([]), json!([])).on(Method::Put, USERS, 204, Value::Null);
        let (service, executor) = scripted_service(scripted, false);
        let outcome = grant(Grantee::User("jsmith".into()), Some(RepositoryPermission::RepoWrite))
            .execute(&service)
            .unwrap();

        assert!(outcome.changed);
        let mutations = executor.mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(
            mutations[0].url.query(),
            Some("name=jsmith&permission=REPO_WRITE")
        );
    }

    #[test]
    fn test_same_permission_any_case_is_noop() {
        let scripted = repository(
            json!([{"user": {"name": "JSmith"}, "permission": "REPO_WRITE"}]),
            json!([]),
        );
        let (service, executor) = scripted_service(scripted, false);
        let outcome = grant(Grantee::User("jsmith".into()), Some(RepositoryPermission::RepoWrite))
            .execute(&service)
            .unwrap();
        assert!(!outcome.changed);
        assert!(executor.mutations().is_empty());
    }

    #[test]
    fn test_group_name_does_not_match_user_entry() {
        let scripted = repository(
            json!([{"user": {"name": "devs"}, "permission": "REPO_READ"}]),
            json!([]),
        )
        .on(Method::Put, GROUPS, 204, Value::Null);
        let (service, executor) = scripted_service(scripted, false);
        let outcome = grant(Grantee::Group("devs".into()), Some(RepositoryPermission::RepoRead))
            .execute(&service)
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(executor.mutations()[0].url.path(), GROUPS);
    }

    #[test]
    fn test_revokes_group() {
        let scripted = repository(
            json!([]),
            json!([{"group": {"name": "devs"}, "permission": "REPO_ADMIN"}]),
        )
        .on(Method::Delete, GROUPS, 204, Value::Null);
        let (service, executor) = scripted_service(scripted, false);
        let outcome = grant(Grantee::Group("devs".into()), None)
            .execute(&service)
            .unwrap();
        assert!(outcome.changed);
        let mutations = executor.mutations();
        assert_eq!(mutations[0].method, Method::Delete);
        assert_eq!(mutations[0].url.query(), Some("name=devs"));
    }

    #[test]
    fn test_missing_repository_is_reported() {
        let scripted = ScriptedExecutor::new().on(
            Method::Get,
            "/rest/api/1.0/projects/FOO",
            200,
            json!({"key": "FOO"}),
        );
        let (service, _) = scripted_service(scripted, false);
        let outcome = grant(Grantee::User("jsmith".into()), None)
            .execute(&service)
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.messages, vec!["Repository `bar` does not exist."]);
    }

    #[test]
    fn test_project_info_lists_users_and_groups() {
        let scripted = ScriptedExecutor::new()
            .on(Method::Get, "/rest/api/1.0/projects/FOO", 200, json!({"key": "FOO"}))
            .on(
                Method::Get,
                "/rest/api/1.0/projects/FOO/permissions/users",
                200,
                ScriptedExecutor::page(json!([{"user": {"name": "amy"}, "permission": "PROJECT_READ"}])),
            )
            .on(
                Method::Get,
                "/rest/api/1.0/projects/FOO/permissions/groups",
                200,
                ScriptedExecutor::page(json!([{"group": {"name": "ops"}, "permission": "PROJECT_ADMIN"}])),
            );
        let (service, executor) = scripted_service(scripted, false);
        let outcome = PermissionsInfoUseCase::new(
            PermissionsInfoConfig::project("FOO").with_filters(vec!["amy".into()]),
        )
        .execute(&service)
        .unwrap();

        assert_eq!(outcome.field("users").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(outcome.field("groups").unwrap().as_array().unwrap().len(), 1);
        let filtered = executor
            .requests()
            .iter()
            .filter(|r| r.url.query().unwrap_or_default().contains("filter=amy"))
            .count();
        assert_eq!(filtered, 2);
    }
}
