//! Infrastructure layer
//!
//! Concrete implementations for the outside world:
//! - HTTP transport, retries, pagination and the Bitbucket endpoint table
//! - Local git operations through libgit2
//! - Connection settings from YAML files and the environment
pub mod filesystem;
pub mod git;
pub mod http;

pub use filesystem::config_store::{ConfigStore, ConnectionConfig};
pub use git::{Git2VersionControl, GitRepository, VersionControl};
pub use http::{Endpoints, RequestExecutor, RetryingExecutor};
