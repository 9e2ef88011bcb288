use clap::Args;

use super::TaskContext;
use crate::application::use_cases::branch::{
    BranchConfig, BranchInfoConfig, BranchInfoUseCase, BranchUseCase, DefaultBranchConfig,
    DefaultBranchUseCase,
};
use crate::application::use_cases::pull_request::{
    PullRequestConfig, PullRequestInfoConfig, PullRequestInfoUseCase, PullRequestUseCase,
};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

/// Project and repository every branch-level task addresses
#[derive(Debug, Args)]
pub struct RepositoryRef {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,
}

#[derive(Debug, Args)]
pub struct BranchArgs {
    #[command(flatten)]
    pub target: RepositoryRef,

    /// Branch to create
    #[arg(long)]
    pub branch: String,

    /// Branch the new one starts from
    #[arg(long = "from-branch", default_value = "master")]
    pub from_branch: String,

    /// Also make it the repository default branch
    #[arg(long = "default")]
    pub is_default: bool,
}

impl BranchArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = BranchConfig::new(&self.target.project_key, &self.target.repository, &self.branch)
            .with_from_branch(&self.from_branch)
            .with_default(self.is_default);
        BranchUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct BranchInfoArgs {
    #[command(flatten)]
    pub target: RepositoryRef,

    /// Branch name filters, `*` for all
    #[arg(long = "branch", value_delimiter = ',')]
    pub filters: Vec<String>,
}

impl BranchInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = BranchInfoConfig::new(&self.target.project_key, &self.target.repository)
            .with_filters(self.filters.clone());
        BranchInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct DefaultBranchArgs {
    #[command(flatten)]
    pub target: RepositoryRef,

    #[arg(long)]
    pub branch: String,
}

impl DefaultBranchArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config =
            DefaultBranchConfig::new(&self.target.project_key, &self.target.repository, &self.branch);
        DefaultBranchUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct PullRequestArgs {
    #[command(flatten)]
    pub target: RepositoryRef,

    #[arg(long = "from-branch", default_value = "develop")]
    pub from_branch: String,

    #[arg(long = "to-branch", default_value = "master")]
    pub to_branch: String,

    #[arg(long, default_value = "")]
    pub title: String,

    /// Defaults to the title
    #[arg(long)]
    pub description: Option<String>,

    /// Reviewer user names
    #[arg(long, value_delimiter = ',')]
    pub reviewers: Vec<String>,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl PullRequestArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = PullRequestConfig::new(&self.target.project_key, &self.target.repository)
            .with_branches(&self.from_branch, &self.to_branch)
            .with_title(&self.title)
            .with_description(self.description.clone())
            .with_reviewers(self.reviewers.clone())
            .with_state(self.state);
        PullRequestUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct PullRequestInfoArgs {
    #[command(flatten)]
    pub target: RepositoryRef,
}

impl PullRequestInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = PullRequestInfoConfig {
            project_key: self.target.project_key.clone(),
            repository: self.target.repository.clone(),
        };
        PullRequestInfoUseCase::new(config).execute(&ctx.service()?)
    }
}
