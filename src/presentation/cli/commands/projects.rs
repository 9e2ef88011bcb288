use clap::Args;
use std::path::PathBuf;

use super::TaskContext;
use crate::application::use_cases::project::{
    ProjectConfig, ProjectInfoConfig, ProjectInfoUseCase, ProjectUseCase,
};
use crate::application::use_cases::repository::{
    RepositoryConfig, RepositoryInfoConfig, RepositoryInfoUseCase, RepositoryUseCase,
};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project key
    #[arg(long, alias = "project")]
    pub project_key: String,

    /// Display name (required when present)
    #[arg(long)]
    pub name: Option<String>,

    /// Description (required when present)
    #[arg(long)]
    pub description: Option<String>,

    /// PNG file used as the project avatar
    #[arg(long)]
    pub avatar: Option<PathBuf>,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl ProjectArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let mut config = ProjectConfig::new(&self.project_key).with_state(self.state);
        if let Some(name) = &self.name {
            config = config.with_name(name);
        }
        if let Some(description) = &self.description {
            config = config.with_description(description);
        }
        if let Some(avatar) = &self.avatar {
            config = config.with_avatar(avatar);
        }
        ProjectUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct ProjectInfoArgs {
    /// Project keys, `*` for all
    #[arg(long = "project-key", alias = "project", value_delimiter = ',')]
    pub project_keys: Vec<String>,
}

impl ProjectInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = ProjectInfoConfig::default().with_keys(self.project_keys.clone());
        ProjectInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct RepoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    /// Repository name
    #[arg(long, alias = "name")]
    pub repository: String,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl RepoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = RepositoryConfig::new(&self.project_key, &self.repository).with_state(self.state);
        RepositoryUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct RepoInfoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    /// Repository names, `*` for all
    #[arg(long = "repository", alias = "name", value_delimiter = ',')]
    pub repositories: Vec<String>,
}

impl RepoInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config =
            RepositoryInfoConfig::new(&self.project_key).with_repositories(self.repositories.clone());
        RepositoryInfoUseCase::new(config).execute(&ctx.service()?)
    }
}
