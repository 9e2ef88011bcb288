use clap::Args;
use std::path::PathBuf;

use super::TaskContext;
use crate::application::use_cases::git_tasks::{
    CloneConfig, CloneUseCase, CommitRequest, GitCommitConfig, GitCommitUseCase, GitInitConfig,
    GitInitUseCase, PushConfig, PushUseCase,
};
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::infrastructure::git::{Committer, TagSpec};

/// Commit identity and message, shared by `git-commit` and `push`
#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Commit message; nothing is committed without one
    #[arg(long)]
    pub message: Option<String>,

    #[arg(long = "committer-name", default_value = "bbtask")]
    pub committer_name: String,

    #[arg(long = "committer-email", default_value = "bbtask@localhost")]
    pub committer_email: String,

    /// Tag the new commit
    #[arg(long)]
    pub tag: Option<String>,

    /// Annotation message, making the tag annotated
    #[arg(long = "tag-message", requires = "tag")]
    pub tag_message: Option<String>,
}

impl CommitArgs {
    fn request(&self) -> Option<CommitRequest> {
        let message = self.message.as_ref()?;
        let tag = self.tag.as_ref().map(|name| match &self.tag_message {
            Some(annotation) => TagSpec::annotated(name, annotation),
            None => TagSpec::lightweight(name),
        });
        Some(
            CommitRequest::new(message, Committer::new(&self.committer_name, &self.committer_email))
                .with_tag(tag),
        )
    }
}

#[derive(Debug, Args)]
pub struct CloneArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// Local directory to clone into
    #[arg(long)]
    pub repodir: PathBuf,

    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Remove an existing repodir first
    #[arg(long)]
    pub force: bool,
}

impl CloneArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = CloneConfig::new(&self.project_key, &self.repository, &self.repodir)
            .with_branch(&self.branch)
            .with_force(self.force);
        CloneUseCase::new(config).execute(&ctx.service()?, ctx.vcs())
    }
}

#[derive(Debug, Args)]
pub struct GitCommitArgs {
    #[arg(long)]
    pub repodir: PathBuf,

    #[command(flatten)]
    pub commit: CommitArgs,
}

impl GitCommitArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let commit = self.commit.request().ok_or_else(|| {
            TaskError::validation_error("message", "A commit message is required", None)
        })?;
        let config = GitCommitConfig {
            repodir: self.repodir.clone(),
            commit,
        };
        GitCommitUseCase::new(config).execute(ctx.vcs(), ctx.check_mode())
    }
}

#[derive(Debug, Args)]
pub struct PushArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    #[arg(long)]
    pub repodir: PathBuf,

    #[command(flatten)]
    pub commit: CommitArgs,

    /// Remove the repodir after a successful push
    #[arg(long = "delete-repodir")]
    pub delete_repodir: bool,
}

impl PushArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = PushConfig::new(&self.project_key, &self.repository, &self.repodir)
            .with_commit(self.commit.request())
            .with_delete_repodir(self.delete_repodir);
        PushUseCase::new(config).execute(&ctx.service()?, ctx.vcs())
    }
}

#[derive(Debug, Args)]
pub struct GitInitArgs {
    #[arg(long)]
    pub repodir: PathBuf,

    /// Wipe the repodir before initializing
    #[arg(long)]
    pub force: bool,
}

impl GitInitArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = GitInitConfig {
            repodir: self.repodir.clone(),
            force: self.force,
        };
        GitInitUseCase::new(config).execute(ctx.vcs(), ctx.check_mode())
    }
}
