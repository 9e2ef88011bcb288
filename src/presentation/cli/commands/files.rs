use clap::{ArgGroup, Args};
use std::path::PathBuf;

use super::TaskContext;
use crate::application::use_cases::copy::{CopyConfig, CopySource, CopyUseCase};
use crate::application::use_cases::directory_sync::DirectorySyncUseCase;
use crate::application::use_cases::files::{FindConfig, FindUseCase, SlurpConfig, SlurpUseCase};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;

#[derive(Debug, Args)]
pub struct FindArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// Directory to search below
    #[arg(long, default_value = "")]
    pub path: String,

    /// Branch, tag or commit to search at
    #[arg(long)]
    pub at: Option<String>,

    /// Regexes matched against each file path
    #[arg(long, value_delimiter = ',')]
    pub patterns: Vec<String>,

    /// Regex the file content must match
    #[arg(long)]
    pub contains: Option<String>,
}

impl FindArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = FindConfig::new(&self.project_key, &self.repository)
            .with_path(&self.path)
            .with_at(self.at.clone())
            .with_patterns(self.patterns.clone())
            .with_contains(self.contains.clone());
        FindUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct SlurpArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// File path inside the repository
    #[arg(long)]
    pub src: String,

    #[arg(long)]
    pub at: Option<String>,
}

impl SlurpArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = SlurpConfig {
            project_key: self.project_key.clone(),
            repository: self.repository.clone(),
            src: self.src.clone(),
            at: self.at.clone(),
        };
        SlurpUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["src", "content"])))]
pub struct CopyArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    /// Local file to upload
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Literal file content to upload
    #[arg(long)]
    pub content: Option<String>,

    /// File path inside the repository
    #[arg(long)]
    pub dest: String,

    #[arg(long)]
    pub branch: Option<String>,

    /// Commit message
    #[arg(long)]
    pub message: Option<String>,
}

impl CopyArgs {
    fn source(&self) -> CopySource {
        match (&self.src, &self.content) {
            (Some(path), _) => CopySource::File(path.clone()),
            (None, content) => CopySource::Content(content.clone().unwrap_or_default()),
        }
    }

    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = CopyConfig::new(&self.project_key, &self.repository, self.source(), &self.dest)
            .with_branch(self.branch.clone())
            .with_message(self.message.clone());
        CopyUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct DirectorySyncArgs {}

impl DirectorySyncArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        DirectorySyncUseCase::new().execute(&ctx.service()?)
    }
}
