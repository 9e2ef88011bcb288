//! Diff-then-converge reconciliation of one desired object against listed current state.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::info;

use crate::common::error::{Operation, TaskError};
use crate::common::result::TaskResult;
use crate::domain::entities::item::Item;
use crate::domain::value_objects::presence::Presence;
use crate::infrastructure::http::executor::{RequestExecutor, ResponseEnvelope};
use crate::infrastructure::http::request::RequestSpec;

type Predicate<'a> = Box<dyn Fn(&Item) -> bool + 'a>;

/// What the caller wants to be true about one remote object.
pub struct DesiredState<'a> {
    pub presence: Presence,
    /// Human-readable name used in messages and errors (`webhook `ci` of FOO/bar`)
    pub entity: String,
    matcher: Predicate<'a>,
    satisfies: Predicate<'a>,
    tolerate_missing: bool,
}

impl<'a> DesiredState<'a> {
    pub fn new(
        presence: Presence,
        entity: impl Into<String>,
        matcher: impl Fn(&Item) -> bool + 'a,
    ) -> Self {
        Self {
            presence,
            entity: entity.into(),
            matcher: Box::new(matcher),
            satisfies: Box::new(|_| true),
            tolerate_missing: false,
        }
    }

    /// Whether a single existing match already has every desired field.
    pub fn satisfied_by(mut self, satisfies: impl Fn(&Item) -> bool + 'a) -> Self {
        self.satisfies = Box::new(satisfies);
        self
    }

    /// Record a 404 on delete instead of failing.
    pub fn tolerate_missing(mut self, tolerate: bool) -> Self {
        self.tolerate_missing = tolerate;
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        (self.matcher)(item)
    }
}

/// The single action chosen for a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<'i> {
    Create,
    Update(&'i Item),
    Delete(Vec<&'i Item>),
    Noop(Option<&'i Item>),
}

impl Decision<'_> {
    pub fn is_change(&self) -> bool {
        !matches!(self, Decision::Noop(_))
    }

    pub fn action(&self) -> Action {
        match self {
            Decision::Create => Action::Create,
            Decision::Update(_) => Action::Update,
            Decision::Delete(_) => Action::Delete,
            Decision::Noop(_) => Action::None,
        }
    }
}

/// Kind of the chosen decision, without the items it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    None,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::None => "none",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal failure kept in the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub operation: String,
    pub entity: String,
    pub status: u16,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub changed: bool,
    pub action: Action,
    pub object: Option<Item>,
    pub errors: Vec<ErrorRecord>,
}

/// Chooses exactly one action from the presence/match-count table.
pub fn plan<'i>(desired: &DesiredState<'_>, current: &'i [Item]) -> TaskResult<Decision<'i>> {
    let matches: Vec<&Item> = current.iter().filter(|item| desired.matches(item)).collect();
    let decision = match (desired.presence, matches.len()) {
        (Presence::Present, 0) => Decision::Create,
        (Presence::Present, 1) => {
            let existing = matches[0];
            if (desired.satisfies)(existing) {
                Decision::Noop(Some(existing))
            } else {
                Decision::Update(existing)
            }
        }
        (Presence::Present, count) => {
            return Err(TaskError::ambiguous_match(desired.entity.as_str(), count));
        }
        (Presence::Absent, 0) => Decision::Noop(None),
        (Presence::Absent, _) => Decision::Delete(matches),
    };
    Ok(decision)
}

/// Sends a mutation and turns any non-2xx answer into a [`TaskError::Mutation`].
pub fn send_mutation(
    executor: &dyn RequestExecutor,
    request: &RequestSpec,
    operation: Operation,
    entity: &str,
) -> TaskResult<ResponseEnvelope> {
    info!("{} {}: {}", operation, entity, request);
    let response = executor.execute(request)?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(TaskError::mutation(
            response.status,
            operation,
            entity,
            response.error_message(),
        ))
    }
}

pub struct Reconciler<'a> {
    executor: &'a dyn RequestExecutor,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(executor: &'a dyn RequestExecutor, check_mode: bool) -> Self {
        Self {
            executor,
            check_mode,
        }
    }

    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    /// Converges `desired` against `current`.
    ///
    /// `mutate(None)` builds the create request; `mutate(Some(item))` builds the update
    /// (presence present) or delete (presence absent) request for an existing item. In check
    /// mode `mutate` is never called.
    pub fn reconcile<F>(
        &self,
        desired: &DesiredState<'_>,
        current: &[Item],
        mutate: F,
    ) -> TaskResult<ReconcileResult>
    where
        F: Fn(Option<&Item>) -> TaskResult<RequestSpec>,
    {
        let decision = plan(desired, current)?;
        let changed = decision.is_change();
        let action = decision.action();

        if self.check_mode {
            info!("[check mode] would {} {}", action, desired.entity);
            let object = match decision {
                Decision::Update(item) | Decision::Noop(Some(item)) => Some(item.clone()),
                _ => None,
            };
            return Ok(ReconcileResult {
                changed,
                action,
                object,
                errors: Vec::new(),
            });
        }

        let mut errors = Vec::new();
        let object = match decision {
            Decision::Noop(existing) => existing.cloned(),
            Decision::Create => {
                let request = mutate(None)?;
                let response =
                    send_mutation(self.executor, &request, Operation::Create, &desired.entity)?;
                response_object(response)
            }
            Decision::Update(existing) => {
                let request = mutate(Some(existing))?;
                let response =
                    send_mutation(self.executor, &request, Operation::Update, &desired.entity)?;
                response_object(response).or_else(|| Some(existing.clone()))
            }
            Decision::Delete(matches) => {
                for existing in matches {
                    let request = mutate(Some(existing))?;
                    match send_mutation(self.executor, &request, Operation::Delete, &desired.entity)
                    {
                        Ok(_) => {}
                        Err(TaskError::Mutation {
                            status: 404,
                            message,
                            ..
                        }) if desired.tolerate_missing => errors.push(ErrorRecord {
                            operation: Operation::Delete.to_string(),
                            entity: desired.entity.clone(),
                            status: 404,
                            message,
                        }),
                        Err(e) => return Err(e),
                    }
                }
                None
            }
        };

        Ok(ReconcileResult {
            changed,
            action,
            object,
            errors,
        })
    }
}

fn response_object(response: ResponseEnvelope) -> Option<Item> {
    match response.into_json() {
        Value::Null => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::MutationErrorKind;
    use crate::infrastructure::http::executor::MockRequestExecutor;
    use crate::infrastructure::http::request::{Method, RawResponse};
    use crate::infrastructure::http::scripted::ScriptedExecutor;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use url::Url;

    fn branches_url() -> Url {
        Url::parse("https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/branches").unwrap()
    }

    fn by_name(name: &'static str) -> impl Fn(&Item) -> bool {
        move |item: &Item| item["name"] == name
    }

    fn create_or_delete(item: Option<&Item>) -> TaskResult<RequestSpec> {
        Ok(match item {
            None => RequestSpec::post(branches_url(), json!({"name": "feature/x"})),
            Some(existing) => {
                let mut url = branches_url();
                url.path_segments_mut()
                    .unwrap()
                    .push(&existing["id"].to_string());
                RequestSpec::delete(url)
            }
        })
    }

    #[test]
    fn test_create_on_absent() {
        let executor = ScriptedExecutor::new().on(
            Method::Post,
            "/rest/api/1.0/projects/FOO/repos/bar/branches",
            200,
            json!({"id": "refs/heads/feature/x", "name": "feature/x"}),
        );
        let desired = DesiredState::new(Presence::Present, "branch `feature/x`", by_name("feature/x"));

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &[], create_or_delete)
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.action, Action::Create);
        assert_eq!(executor.mutations().len(), 1);
        assert_eq!(result.object.unwrap()["name"], "feature/x");
    }

    #[test]
    fn test_noop_on_match() {
        let mut executor = MockRequestExecutor::new();
        executor.expect_execute().never();
        let current = vec![json!({"name": "master", "isDefault": true})];
        let desired = DesiredState::new(Presence::Present, "branch `master`", by_name("master"))
            .satisfied_by(|item| item["isDefault"] == true);

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &current, create_or_delete)
            .unwrap();

        assert!(!result.changed);
        assert_eq!(result.object, Some(current[0].clone()));
    }

    #[test]
    fn test_update_when_not_satisfied() {
        let executor = ScriptedExecutor::new().on(
            Method::Put,
            "/rest/api/1.0/projects/FOO/repos/bar/branches",
            204,
            Value::Null,
        );
        let current = vec![json!({"name": "develop", "isDefault": false})];
        let desired = DesiredState::new(Presence::Present, "branch `develop`", by_name("develop"))
            .satisfied_by(|item| item["isDefault"] == true);

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &current, |_| {
                Ok(RequestSpec::put(branches_url(), json!({"id": "refs/heads/develop"})))
            })
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.action, Action::Update);
        // empty 204 body falls back to the existing item
        assert_eq!(result.object, Some(current[0].clone()));
    }

    #[test]
    fn test_delete_when_absent_desired() {
        let executor = ScriptedExecutor::new().on(
            Method::Delete,
            "/rest/api/1.0/projects/FOO/repos/bar/branches/42",
            204,
            Value::Null,
        );
        let current = vec![json!({"id": 42}), json!({"id": 43})];
        let desired = DesiredState::new(Presence::Absent, "restriction 42", |item: &Item| {
            item["id"] == 42
        });

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &current, create_or_delete)
            .unwrap();

        assert!(result.changed);
        let mutations = executor.mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].method, Method::Delete);
        assert!(mutations[0].url.path().ends_with("/42"));
    }

    #[test]
    fn test_absent_and_missing_is_noop() {
        let mut executor = MockRequestExecutor::new();
        executor.expect_execute().never();
        let desired = DesiredState::new(Presence::Absent, "webhook `ci`", by_name("ci"));

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &[json!({"name": "other"})], create_or_delete)
            .unwrap();

        assert!(!result.changed);
        assert_eq!(result.action, Action::None);
    }

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_value(Action::Create).unwrap(), json!("create"));
        assert_eq!(Action::None.to_string(), "none");
        assert_eq!(Decision::Delete(vec![]).action(), Action::Delete);
    }

    #[test]
    fn test_ambiguous_match_issues_no_request() {
        let mut executor = MockRequestExecutor::new();
        executor.expect_execute().never();
        let current = vec![json!({"name": "ci"}), json!({"name": "ci"})];
        let desired = DesiredState::new(Presence::Present, "webhook `ci`", by_name("ci"));

        let error = Reconciler::new(&executor, false)
            .reconcile(&desired, &current, create_or_delete)
            .unwrap_err();

        assert!(matches!(error, TaskError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_check_mode_never_mutates_and_keeps_verdict() {
        let cases: Vec<(Presence, Vec<Item>, bool)> = vec![
            (Presence::Present, vec![], true),
            (Presence::Present, vec![json!({"name": "x", "ok": false})], true),
            (Presence::Present, vec![json!({"name": "x", "ok": true})], false),
            (Presence::Absent, vec![json!({"name": "x", "id": 1})], true),
            (Presence::Absent, vec![], false),
        ];

        for (presence, current, expected) in cases {
            let mut executor = MockRequestExecutor::new();
            executor.expect_execute().never();
            let mutate_calls = Cell::new(0);
            let desired = DesiredState::new(presence, "thing `x`", by_name("x"))
                .satisfied_by(|item| item["ok"] == true);

            let result = Reconciler::new(&executor, true)
                .reconcile(&desired, &current, |item| {
                    mutate_calls.set(mutate_calls.get() + 1);
                    create_or_delete(item)
                })
                .unwrap();

            assert_eq!(result.changed, expected, "{presence} with {current:?}");
            assert_eq!(mutate_calls.get(), 0);
        }
    }

    #[test]
    fn test_idempotent_across_refreshed_state() {
        let executor = ScriptedExecutor::new().on(
            Method::Post,
            "/rest/api/1.0/projects/FOO/repos/bar/branches",
            200,
            json!({"id": "refs/heads/feature/x", "name": "feature/x"}),
        );
        let reconciler = Reconciler::new(&executor, false);
        let desired = DesiredState::new(Presence::Present, "branch `feature/x`", by_name("feature/x"));

        let first = reconciler.reconcile(&desired, &[], create_or_delete).unwrap();
        let refreshed = vec![first.object.clone().unwrap()];
        let second = reconciler
            .reconcile(&desired, &refreshed, create_or_delete)
            .unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(executor.mutations().len(), 1);
    }

    #[test]
    fn test_rejected_mutation_is_kinded() {
        let executor = ScriptedExecutor::new().on_raw(
            Method::Post,
            "/rest/api/1.0/projects/FOO/repos/bar/branches",
            RawResponse::json(
                409,
                &json!({"errors": [{"message": "Branch already exists"}]}),
            ),
        );
        let desired = DesiredState::new(Presence::Present, "branch `feature/x`", by_name("feature/x"));

        let error = Reconciler::new(&executor, false)
            .reconcile(&desired, &[], create_or_delete)
            .unwrap_err();

        assert_eq!(error.mutation_kind(), Some(MutationErrorKind::Conflict));
        let message = error.to_string();
        assert!(message.contains("create branch `feature/x`"));
        assert!(message.contains("409"));
        assert!(message.contains("Branch already exists"));
    }

    #[test]
    fn test_tolerated_missing_delete_is_recorded() {
        let executor = ScriptedExecutor::new();
        let desired = DesiredState::new(Presence::Absent, "application link `FOO`", by_name("FOO"))
            .tolerate_missing(true);
        let current = vec![json!({"name": "FOO", "id": 9})];

        let result = Reconciler::new(&executor, false)
            .reconcile(&desired, &current, create_or_delete)
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].status, 404);
    }
}
