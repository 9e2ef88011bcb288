use serde_json::{json, Value};

use super::record_reconcile;
use crate::application::reconciler::DesiredState;
use crate::application::services::BitbucketService;
use crate::common::error::TaskError;
use crate::common::result::{OptionExt, TaskResult};
use crate::domain::entities::item::{i64_at, id_of, str_at, Item};
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::presence::Presence;

/// Settings for the `project-reviewer` task
#[derive(Debug, Clone)]
pub struct DefaultReviewersConfig {
    pub project_key: String,
    pub branch: BranchName,
    /// User slugs
    pub reviewers: Vec<String>,
    pub required_approvals: u32,
    pub state: Presence,
}

impl DefaultReviewersConfig {
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            branch: BranchName::new("master"),
            reviewers: Vec::new(),
            required_approvals: 0,
            state: Presence::Present,
        }
    }

    pub fn with_branch(mut self, branch: impl AsRef<str>) -> Self {
        self.branch = BranchName::new(branch);
        self
    }

    pub fn with_reviewers(mut self, reviewers: Vec<String>, required_approvals: u32) -> Self {
        self.reviewers = reviewers;
        self.required_approvals = required_approvals;
        self
    }

    pub fn with_state(mut self, state: Presence) -> Self {
        self.state = state;
        self
    }

    pub fn validate(&self) -> TaskResult<()> {
        if self.state == Presence::Absent {
            return Ok(());
        }
        if self.reviewers.is_empty() {
            return Err(TaskError::validation_error(
                "reviewers",
                "Please provide reviewers",
                None,
            ));
        }
        if self.required_approvals as usize > self.reviewers.len() {
            return Err(TaskError::validation_error(
                "approvals",
                format!(
                    "Number of approvals required {} is higher than number of reviewers provided {}",
                    self.required_approvals,
                    self.reviewers.len()
                ),
                Some(self.required_approvals.to_string()),
            ));
        }
        Ok(())
    }

    /// Whether a listed condition targets this branch. Servers report the target as either
    /// the full ref or the short name in `displayId`.
    fn targets(&self, item: &Item) -> bool {
        let full = self.branch.to_ref();
        let display = str_at(item, "/targetRefMatcher/displayId");
        display == Some(full.as_str())
            || display == Some(self.branch.as_str())
            || str_at(item, "/targetRefMatcher/id") == Some(full.as_str())
    }

    fn body(&self, reviewer_ids: &[i64]) -> Value {
        let reviewers: Vec<Value> = reviewer_ids.iter().map(|id| json!({ "id": id })).collect();
        json!({
            "reviewers": reviewers,
            "sourceMatcher": {
                "active": true,
                "id": "refs/heads/**",
                "displayId": "refs/heads/**",
                "type": { "id": "PATTERN", "name": "Pattern" },
            },
            "targetMatcher": {
                "active": true,
                "id": self.branch.to_ref(),
                "displayId": self.branch.as_str(),
                "type": { "id": "BRANCH", "name": "Branch" },
            },
            "requiredApprovals": self.required_approvals,
        })
    }
}

fn listed_reviewer_ids(item: &Item) -> Vec<i64> {
    let mut ids: Vec<i64> = item
        .get("reviewers")
        .and_then(Value::as_array)
        .map(|reviewers| reviewers.iter().filter_map(|r| i64_at(r, "/id")).collect())
        .unwrap_or_default();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub struct DefaultReviewersUseCase {
    config: DefaultReviewersConfig,
}

impl DefaultReviewersUseCase {
    pub fn new(config: DefaultReviewersConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        config.validate()?;
        let key = config.project_key.as_str();
        service.require_project(key)?;

        let mut reviewer_ids = Vec::with_capacity(config.reviewers.len());
        if config.state == Presence::Present {
            for slug in &config.reviewers {
                reviewer_ids.push(service.user_id(slug.trim())?);
            }
        }
        let mut wanted_ids = reviewer_ids.clone();
        wanted_ids.sort_unstable();
        wanted_ids.dedup();

        let current = service.list(
            &service.endpoints().reviewer_conditions(key),
            &[],
            &format!("default reviewer conditions of project `{key}`"),
        )?;
        let desired = DesiredState::new(
            config.state,
            format!("default reviewers for `{}` of project `{key}`", config.branch),
            |item| config.targets(item),
        )
        .satisfied_by(|item| {
            listed_reviewer_ids(item) == wanted_ids
                && i64_at(item, "/requiredApprovals") == Some(i64::from(config.required_approvals))
        });

        let endpoints = service.endpoints();
        let result = service.reconciler().reconcile(&desired, &current, |existing| {
            let Some(item) = existing else {
                return Ok(endpoints.create_reviewer_condition(key, config.body(&reviewer_ids)));
            };
            let id = id_of(item).ok_or_internal_error("listed reviewer condition has no id")?;
            Ok(match config.state {
                Presence::Present => {
                    endpoints.update_reviewer_condition(key, &id, config.body(&reviewer_ids))
                }
                Presence::Absent => endpoints.delete_reviewer_condition(key, &id),
            })
        })?;

        let mut outcome = TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("state", config.state.to_string());
        record_reconcile(&mut outcome, result);
        Ok(outcome)
    }
}
