pub mod repository;
pub mod version_control;

pub use repository::{CommitSummary, Committer, GitRepository, PushSummary, RefRejection, TagSpec};
#[cfg(test)]
pub use version_control::MockVersionControl;
pub use version_control::{Git2VersionControl, VersionControl};
