use clap::{ArgGroup, Args};

use super::TaskContext;
use crate::application::use_cases::branch_restrictions::{
    BranchRestrictionsConfig, BranchRestrictionsInfoConfig, BranchRestrictionsInfoUseCase,
    BranchRestrictionsUseCase, RestrictionSpec,
};
use crate::application::use_cases::default_reviewers::{
    DefaultReviewersConfig, DefaultReviewersUseCase,
};
use crate::application::use_cases::permissions::{
    PermissionsInfoConfig, PermissionsInfoUseCase, RepositoryPermissionsConfig,
    RepositoryPermissionsUseCase,
};
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::permission::{Grantee, RepositoryPermission};
use crate::domain::value_objects::presence::Presence;
use crate::domain::value_objects::restriction::{BranchMatcher, RestrictionKind};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("grantee").required(true).args(["user", "group"])))]
pub struct RepoPermissionsArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// User slug receiving the permission
    #[arg(long)]
    pub user: Option<String>,

    /// Group receiving the permission
    #[arg(long)]
    pub group: Option<String>,

    /// REPO_READ, REPO_WRITE or REPO_ADMIN; omit to revoke
    #[arg(long)]
    pub permission: Option<RepositoryPermission>,
}

impl RepoPermissionsArgs {
    fn grantee(&self) -> TaskResult<Grantee> {
        match (&self.user, &self.group) {
            (Some(user), None) => Ok(Grantee::User(user.clone())),
            (None, Some(group)) => Ok(Grantee::Group(group.clone())),
            _ => Err(TaskError::validation_error(
                "grantee",
                "Exactly one of user or group is required",
                None,
            )),
        }
    }

    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config =
            RepositoryPermissionsConfig::new(&self.project_key, &self.repository, self.grantee()?)
                .with_permission(self.permission);
        RepositoryPermissionsUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct RepoPermissionsInfoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// User or group name filters, `*` for all
    #[arg(long = "filter", value_delimiter = ',')]
    pub filters: Vec<String>,
}

impl RepoPermissionsInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = PermissionsInfoConfig::repository(&self.project_key, &self.repository)
            .with_filters(self.filters.clone());
        PermissionsInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct ProjectPermissionsInfoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long = "filter", value_delimiter = ',')]
    pub filters: Vec<String>,
}

impl ProjectPermissionsInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config =
            PermissionsInfoConfig::project(&self.project_key).with_filters(self.filters.clone());
        PermissionsInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("matcher").required(true).args(["branch", "pattern", "model"])))]
pub struct BranchPermissionsArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    /// Restrict one repository instead of the whole project
    #[arg(long)]
    pub repository: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    /// Wildcard branch pattern
    #[arg(long)]
    pub pattern: Option<String>,

    /// Branching model branch or category (development, production, bugfix, feature, hotfix, release)
    #[arg(long)]
    pub model: Option<String>,

    /// Restrictions to apply, e.g. `deletion`, `rewriting-history`
    #[arg(long, value_delimiter = ',')]
    pub prevent: Vec<RestrictionKind>,

    /// Users exempt from every listed restriction
    #[arg(long = "exempt-users", value_delimiter = ',')]
    pub exempt_users: Vec<String>,

    #[arg(long = "exempt-groups", value_delimiter = ',')]
    pub exempt_groups: Vec<String>,

    /// Access key ids exempt from every listed restriction
    #[arg(long = "exempt-access-keys", value_delimiter = ',')]
    pub exempt_access_keys: Vec<String>,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl BranchPermissionsArgs {
    fn matcher(&self) -> TaskResult<BranchMatcher> {
        match (&self.branch, &self.pattern, &self.model) {
            (Some(branch), None, None) => Ok(BranchMatcher::Name(BranchName::new(branch))),
            (None, Some(pattern), None) => Ok(BranchMatcher::Pattern(pattern.clone())),
            (None, None, Some(model)) => Ok(BranchMatcher::Model(model.to_lowercase())),
            _ => Err(TaskError::validation_error(
                "matcher",
                "Exactly one of branch, pattern or model is required",
                None,
            )),
        }
    }

    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let mut config = BranchRestrictionsConfig::new(&self.project_key, self.matcher()?)
            .with_repository(self.repository.clone())
            .with_state(self.state);
        for kind in &self.prevent {
            config = config.with_restriction(
                RestrictionSpec::new(*kind)
                    .with_users(self.exempt_users.clone())
                    .with_groups(self.exempt_groups.clone())
                    .with_access_keys(self.exempt_access_keys.clone()),
            );
        }
        BranchRestrictionsUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct BranchPermissionsInfoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: Option<String>,
}

impl BranchPermissionsInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = BranchRestrictionsInfoConfig {
            project_key: self.project_key.clone(),
            repository: self.repository.clone(),
        };
        BranchRestrictionsInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct ProjectReviewerArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    /// Target branch of the pull requests
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Reviewer user slugs
    #[arg(long, value_delimiter = ',')]
    pub reviewers: Vec<String>,

    #[arg(long = "required-approvals", default_value_t = 0)]
    pub required_approvals: u32,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl ProjectReviewerArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = DefaultReviewersConfig::new(&self.project_key)
            .with_branch(&self.branch)
            .with_reviewers(self.reviewers.clone(), self.required_approvals)
            .with_state(self.state);
        DefaultReviewersUseCase::new(config).execute(&ctx.service()?)
    }
}
