use serde::{Deserialize, Serialize};
use std::fmt;

const HEADS_PREFIX: &str = "refs/heads/";

/// Short branch name (`feature/x`), convertible to its full ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Accepts either a short name or a full `refs/heads/...` ref.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim();
        Self(name.strip_prefix(HEADS_PREFIX).unwrap_or(name).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `refs/heads/<name>`
    pub fn to_ref(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }

    /// `refs/heads/<name>:refs/heads/<name>`
    pub fn push_refspec(&self) -> String {
        let full = self.to_ref();
        format!("{full}:{full}")
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
