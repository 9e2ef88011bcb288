//! Argument structs for every task, each turning its flags into a use case config.

pub mod access;
pub mod branches;
pub mod files;
pub mod git;
pub mod integrations;
pub mod projects;

pub use access::*;
pub use branches::*;
pub use files::*;
pub use git::*;
pub use integrations::*;
pub use projects::*;

use crate::application::services::BitbucketService;
use crate::common::result::TaskResult;
use crate::infrastructure::filesystem::config_store::ConnectionConfig;
use crate::infrastructure::git::{Git2VersionControl, VersionControl};

/// What a task needs from the invocation: connection settings, check mode and git.
///
/// The HTTP client is built when a task asks for it, so local git tasks run without credentials.
pub struct TaskContext {
    connection: ConnectionConfig,
    check_mode: bool,
    vcs: Git2VersionControl,
}

impl TaskContext {
    pub fn new(connection: ConnectionConfig, check_mode: bool) -> Self {
        Self {
            connection,
            check_mode,
            vcs: Git2VersionControl::new(),
        }
    }

    pub fn service(&self) -> TaskResult<BitbucketService> {
        BitbucketService::from_config(&self.connection, self.check_mode)
    }

    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    pub fn vcs(&self) -> &dyn VersionControl {
        &self.vcs
    }
}
