//! One use case per task. Each takes its `*Config`, runs against a [`BitbucketService`]
//! and returns a [`TaskOutcome`].
//!
//! [`BitbucketService`]: crate::application::services::BitbucketService

use serde_json::{json, Value};

use crate::application::reconciler::ReconcileResult;
use crate::domain::entities::outcome::TaskOutcome;

pub mod application_link;
pub mod branch;
pub mod branch_restrictions;
pub mod copy;
pub mod default_reviewers;
pub mod directory_sync;
pub mod files;
pub mod git_tasks;
pub mod permissions;
pub mod project;
pub mod pull_request;
pub mod repository;
pub mod webhook;

/// Copies the reconcile verdict into `outcome`: `changed`, `action`, the resulting object
/// as `json`, and tolerated delete failures as `errors`.
pub(crate) fn record_reconcile(outcome: &mut TaskOutcome, result: ReconcileResult) {
    outcome.mark_changed(result.changed);
    outcome.set_field("action", result.action.as_str());
    outcome.set_field("json", result.object.unwrap_or_else(|| json!({})));
    if !result.errors.is_empty() {
        let errors = serde_json::to_value(&result.errors).unwrap_or(Value::Null);
        outcome.set_field("errors", errors);
    }
}

/// Trimmed, non-empty filters; `["*"]` when none remain.
pub(crate) fn wildcard(values: &[String]) -> Vec<String> {
    let filters: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if filters.is_empty() {
        vec!["*".to_string()]
    } else {
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_defaults() {
        assert_eq!(wildcard(&[]), vec!["*"]);
        assert_eq!(wildcard(&[" ".into()]), vec!["*"]);
        assert_eq!(wildcard(&[" a ".into(), "b".into()]), vec!["a", "b"]);
    }
}
