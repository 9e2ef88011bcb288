//! # bbtask - Bitbucket Server automation
//!
//! `bbtask` runs declarative, idempotent tasks against a Bitbucket Server REST API. Each task
//! describes the desired state of one server entity (a project, a webhook, a branch
//! restriction, ...), compares it with what the server reports, and performs the single
//! create, update or delete needed to converge. With `--check` nothing is changed and the
//! task only reports what it would do.
//!
//! ## Quick Start
//!
//! ```bash
//! export BITBUCKET_URL=https://bitbucket.example.com
//! export BITBUCKET_TOKEN=...
//!
//! bbtask project --project-key FOO --name Foo --description "Foo team"
//! bbtask repo --project-key FOO --repository bar
//! bbtask webhook --project-key FOO --repository bar --name ci \
//!     --webhook-url https://ci.example.com/hook --check
//! ```
//!
//! Every invocation prints one JSON (or YAML) record with at least `changed`; failures print
//! `{"changed": false, "failed": true, "msg": ...}` and exit with status 1.
//!
//! ## Architecture
//!
//! - [`domain`]: server records, task outcomes and typed parameters
//! - [`application`]: the [`Reconciler`](application::reconciler::Reconciler), the
//!   [`BitbucketService`](application::services::BitbucketService) and one use case per task
//! - [`infrastructure`]: the retrying HTTP executor, paginated listing, configuration files
//!   and git operations through libgit2
//! - [`presentation`]: the command line
//! - [`common`]: [`TaskError`] and [`Result`]
//!
//! ## Using the Library
//!
//! ```rust,no_run
//! use bbtask::application::services::BitbucketService;
//! use bbtask::application::use_cases::repository::{RepositoryConfig, RepositoryUseCase};
//! use bbtask::infrastructure::filesystem::config_store::{ConfigStore, ConnectionOverrides};
//!
//! # fn example() -> bbtask::Result<()> {
//! let connection = ConfigStore::new().load_connection(None, ConnectionOverrides {
//!     url: Some("https://bitbucket.example.com".into()),
//!     token: Some("secret".into()),
//!     ..ConnectionOverrides::default()
//! })?;
//! let service = BitbucketService::from_config(&connection, false)?;
//!
//! let outcome = RepositoryUseCase::new(RepositoryConfig::new("FOO", "bar")).execute(&service)?;
//! println!("changed: {}", outcome.changed);
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use crate::common::error::TaskError;
pub use crate::common::result::TaskResult as Result;
