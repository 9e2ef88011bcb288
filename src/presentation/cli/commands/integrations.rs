use clap::Args;

use super::TaskContext;
use crate::application::use_cases::application_link::{
    ApplicationLinkConfig, ApplicationLinkInfoConfig, ApplicationLinkInfoUseCase,
    ApplicationLinkUseCase, ConsumerConfig,
};
use crate::application::use_cases::webhook::{
    WebhookConfig, WebhookInfoConfig, WebhookInfoUseCase, WebhookUseCase,
};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::presence::Presence;

#[derive(Debug, Args)]
pub struct WebhookArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,

    #[arg(long)]
    pub name: String,

    /// Callback URL
    #[arg(long = "webhook-url", default_value = "")]
    pub webhook_url: String,

    #[arg(long, value_delimiter = ',', default_value = "repo:refs_changed")]
    pub events: Vec<String>,

    /// Register the webhook disabled
    #[arg(long)]
    pub inactive: bool,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl WebhookArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = WebhookConfig::new(
            &self.project_key,
            &self.repository,
            &self.name,
            &self.webhook_url,
        )
        .with_events(self.events.clone())
        .with_active(!self.inactive)
        .with_state(self.state);
        WebhookUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct WebhookInfoArgs {
    #[arg(long, alias = "project")]
    pub project_key: String,

    #[arg(long)]
    pub repository: String,
}

impl WebhookInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = WebhookInfoConfig {
            project_key: self.project_key.clone(),
            repository: self.repository.clone(),
        };
        WebhookInfoUseCase::new(config).execute(&ctx.service()?)
    }
}

/// Incoming OAuth consumer flags; all of them are ignored without `--consumer-key`.
#[derive(Debug, Args)]
pub struct ConsumerArgs {
    #[arg(long = "consumer-key", requires = "consumer_public_key")]
    pub consumer_key: Option<String>,

    /// PEM public key of the consumer
    #[arg(long = "consumer-public-key")]
    pub consumer_public_key: Option<String>,

    #[arg(long = "consumer-description")]
    pub consumer_description: Option<String>,

    #[arg(long = "consumer-shared-secret")]
    pub consumer_shared_secret: Option<String>,

    #[arg(long)]
    pub outgoing: bool,

    #[arg(long = "two-lo-allowed")]
    pub two_lo_allowed: bool,

    #[arg(long = "executing-two-lo-user")]
    pub executing_two_lo_user: Option<String>,

    #[arg(long = "two-lo-impersonation-allowed")]
    pub two_lo_impersonation_allowed: Option<bool>,
}

impl ConsumerArgs {
    fn consumer(&self) -> Option<ConsumerConfig> {
        let key = self.consumer_key.as_ref()?;
        let mut consumer =
            ConsumerConfig::new(key, self.consumer_public_key.clone().unwrap_or_default());
        consumer.description = self.consumer_description.clone();
        consumer.shared_secret = self.consumer_shared_secret.clone();
        consumer.outgoing = self.outgoing;
        consumer.two_lo_allowed = self.two_lo_allowed;
        consumer.executing_two_lo_user = self.executing_two_lo_user.clone();
        consumer.two_lo_impersonation_allowed = self.two_lo_impersonation_allowed;
        Some(consumer)
    }
}

#[derive(Debug, Args)]
pub struct ApplicationLinkArgs {
    #[arg(long)]
    pub name: String,

    /// Existing link id, matched before the name
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long = "rpc-url")]
    pub rpc_url: Option<String>,

    /// Defaults to the RPC URL
    #[arg(long = "display-url")]
    pub display_url: Option<String>,

    #[command(flatten)]
    pub consumer: ConsumerArgs,

    /// Fail instead of reporting when an absent link is already gone
    #[arg(long = "fail-when-not-exists")]
    pub fail_when_not_exists: bool,

    #[arg(long, default_value = "present")]
    pub state: Presence,
}

impl ApplicationLinkArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let mut config = ApplicationLinkConfig::new(&self.name)
            .with_id(self.id.clone())
            .with_consumer(self.consumer.consumer())
            .with_fail_when_not_exists(self.fail_when_not_exists)
            .with_state(self.state);
        if let Some(rpc_url) = &self.rpc_url {
            let display_url = self.display_url.as_ref().unwrap_or(rpc_url);
            config = config.with_urls(rpc_url, display_url);
        }
        ApplicationLinkUseCase::new(config).execute(&ctx.service()?)
    }
}

#[derive(Debug, Args)]
pub struct ApplicationLinkInfoArgs {
    /// Link ids or names, `*` for all
    #[arg(long = "link", value_delimiter = ',')]
    pub filters: Vec<String>,
}

impl ApplicationLinkInfoArgs {
    pub fn run(&self, ctx: &TaskContext) -> TaskResult<TaskOutcome> {
        let config = ApplicationLinkInfoConfig {
            filters: self.filters.clone(),
        };
        ApplicationLinkInfoUseCase::new(config).execute(&ctx.service()?)
    }
}
