pub mod commands;
pub mod output;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::infrastructure::filesystem::config_store::{ConfigStore, ConnectionOverrides};

use self::commands::*;
use self::output::{failure_record, summary, OutputFormat};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

/// Server connection flags, overlaid on the `--config` file
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// YAML file with connection settings
    #[arg(long, global = true, env = "BBTASK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bitbucket Server base URL
    #[arg(long, global = true, env = "BITBUCKET_URL")]
    pub url: Option<String>,

    #[arg(long, global = true, env = "BITBUCKET_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "BITBUCKET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Personal access token, sent as a bearer token
    #[arg(long, global = true, env = "BITBUCKET_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub no_validate_certs: bool,

    /// Ignore proxy environment variables
    #[arg(long, global = true)]
    pub no_proxy: bool,

    /// Retries for transport failures and 5xx responses
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Seconds to wait between retries
    #[arg(long, global = true)]
    pub retry_delay: Option<u64>,
}

impl ConnectionArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            validate_certs: self.no_validate_certs.then_some(false),
            use_proxy: self.no_proxy.then_some(false),
            retries: self.retries,
            retry_delay_secs: self.retry_delay,
        }
    }
}

/// bbtask - declarative, idempotent tasks for Bitbucket Server
#[derive(Debug, Parser)]
#[command(name = "bbtask")]
#[command(about = "Declarative, idempotent automation tasks for Bitbucket Server")]
#[command(version, long_version = LONG_VERSION)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Report what would change without changing anything
    #[arg(long, global = true)]
    pub check: bool,

    /// Output format of the task result
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, update or delete a project
    Project(ProjectArgs),
    /// Describe projects
    ProjectInfo(ProjectInfoArgs),
    /// Create or delete a repository
    Repo(RepoArgs),
    /// Describe repositories of a project
    RepoInfo(RepoInfoArgs),
    /// Create a branch
    Branch(BranchArgs),
    /// Describe branches of a repository
    BranchInfo(BranchInfoArgs),
    /// Set the default branch of a repository
    DefaultBranch(DefaultBranchArgs),
    /// Grant or revoke a repository permission for a user or group
    RepoPermissions(RepoPermissionsArgs),
    /// List user and group permissions of a repository
    RepoPermissionsInfo(RepoPermissionsInfoArgs),
    /// List user and group permissions of a project
    ProjectPermissionsInfo(ProjectPermissionsInfoArgs),
    /// Configure restrictions on matching branches
    BranchPermissions(BranchPermissionsArgs),
    /// List branch restrictions
    BranchPermissionsInfo(BranchPermissionsInfoArgs),
    /// Create, update or delete a repository webhook
    Webhook(WebhookArgs),
    /// List repository webhooks
    WebhookInfo(WebhookInfoArgs),
    /// Open or delete a pull request
    PullRequest(PullRequestArgs),
    /// List open pull requests of a repository
    PullRequestInfo(PullRequestInfoArgs),
    /// Configure default reviewers of a project
    ProjectReviewer(ProjectReviewerArgs),
    /// Create, update or delete an application link
    ApplicationLink(ApplicationLinkArgs),
    /// Describe application links
    ApplicationLinkInfo(ApplicationLinkInfoArgs),
    /// Find files in a repository by path and content
    Find(FindArgs),
    /// Fetch a file from a repository, base64 encoded
    Slurp(SlurpArgs),
    /// Create or update one file of a repository
    Copy(CopyArgs),
    /// Synchronise user directories
    DirectorySync(DirectorySyncArgs),
    /// Clone a repository into a local directory
    Clone(CloneArgs),
    /// Commit every pending change of a local repository
    GitCommit(GitCommitArgs),
    /// Push a local repository to its Bitbucket remote
    Push(PushArgs),
    /// Initialize an empty local repository
    GitInit(GitInitArgs),
}

impl Commands {
    fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        match self {
            Self::Project(args) => args.run(ctx),
            Self::ProjectInfo(args) => args.run(ctx),
            Self::Repo(args) => args.run(ctx),
            Self::RepoInfo(args) => args.run(ctx),
            Self::Branch(args) => args.run(ctx),
            Self::BranchInfo(args) => args.run(ctx),
            Self::DefaultBranch(args) => args.run(ctx),
            Self::RepoPermissions(args) => args.run(ctx),
            Self::RepoPermissionsInfo(args) => args.run(ctx),
            Self::ProjectPermissionsInfo(args) => args.run(ctx),
            Self::BranchPermissions(args) => args.run(ctx),
            Self::BranchPermissionsInfo(args) => args.run(ctx),
            Self::Webhook(args) => args.run(ctx),
            Self::WebhookInfo(args) => args.run(ctx),
            Self::PullRequest(args) => args.run(ctx),
            Self::PullRequestInfo(args) => args.run(ctx),
            Self::ProjectReviewer(args) => args.run(ctx),
            Self::ApplicationLink(args) => args.run(ctx),
            Self::ApplicationLinkInfo(args) => args.run(ctx),
            Self::Find(args) => args.run(ctx),
            Self::Slurp(args) => args.run(ctx),
            Self::Copy(args) => args.run(ctx),
            Self::DirectorySync(args) => args.run(ctx),
            Self::Clone(args) => args.run(ctx),
            Self::GitCommit(args) => args.run(ctx),
            Self::Push(args) => args.run(ctx),
            Self::GitInit(args) => args.run(ctx),
        }
    }
}

/// Main CLI application
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self { cli }
    }

    fn init_logging(&self) {
        let default_level = match self.cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("bbtask={default_level}")));
        // A subscriber may already be installed when embedded.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    fn execute(&self) -> TaskResult<TaskOutcome> {
        let connection = ConfigStore::new().load_connection(
            self.cli.connection.config.as_deref(),
            self.cli.connection.overrides(),
        )?;
        debug!("Connection settings: {connection:?}");
        let ctx = TaskContext::new(connection, self.cli.check);
        self.cli.command.run(&ctx)
    }

    pub fn run(self) -> Result<()> {
        colored::control::set_override(!self.cli.no_color && atty::is(atty::Stream::Stderr));
        self.init_logging();

        let result = self.execute();
        if !self.cli.no_color && atty::is(atty::Stream::Stderr) {
            eprintln!("{}", summary(&result));
        }

        match result {
            Ok(outcome) => {
                println!("{}", self.cli.format.render(&outcome)?);
                Ok(())
            }
            Err(e) => {
                println!("{}", self.cli.format.render(&failure_record(&e))?);
                exit(1);
            }
        }
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}
