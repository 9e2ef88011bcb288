use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::branch_name::BranchName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestrictionError {
    #[error(
        "Unsupported restriction `{0}`, expected one of: deletion, rewriting history, \
         changes without a pull request, all changes"
    )]
    UnknownPrevent(String),
}

/// What a branch restriction prevents, mapped to the server's restriction type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// `no-deletes`
    Deletion,
    /// `fast-forward-only`
    RewritingHistory,
    /// `pull-request-only`
    ChangesWithoutPullRequest,
    /// `read-only`
    AllChanges,
}

impl RestrictionKind {
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Deletion => "no-deletes",
            Self::RewritingHistory => "fast-forward-only",
            Self::ChangesWithoutPullRequest => "pull-request-only",
            Self::AllChanges => "read-only",
        }
    }
}

impl fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_id())
    }
}

impl FromStr for RestrictionKind {
    type Err = RestrictionError;

    /// Accepts the human phrasing (`rewriting history`), its hyphenated form, or the raw
    /// type id (`fast-forward-only`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "deletion" | "no deletes" => Ok(Self::Deletion),
            "rewriting history" | "fast forward only" => Ok(Self::RewritingHistory),
            "changes without a pull request" | "pull request only" => {
                Ok(Self::ChangesWithoutPullRequest)
            }
            "all changes" | "read only" => Ok(Self::AllChanges),
            _ => Err(RestrictionError::UnknownPrevent(s.to_string())),
        }
    }
}

/// Which branches a restriction applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchMatcher {
    /// A single branch, matched by its full ref
    Name(BranchName),
    /// Wildcard pattern
    Pattern(String),
    /// Branching-model branch (`development`, `production`) or category (`bugfix`, `release`, ...)
    Model(String),
}

impl BranchMatcher {
    fn model_is_branch(name: &str) -> bool {
        matches!(name, "development" | "production")
    }

    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Name(_) => "BRANCH",
            Self::Pattern(_) => "PATTERN",
            Self::Model(name) if Self::model_is_branch(name) => "MODEL_BRANCH",
            Self::Model(_) => "MODEL_CATEGORY",
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Name(_) => "Branch",
            Self::Pattern(_) => "Pattern",
            Self::Model(name) if Self::model_is_branch(name) => "Branching model branch",
            Self::Model(_) => "Branching model category",
        }
    }

    pub fn id(&self) -> String {
        match self {
            Self::Name(branch) => branch.to_ref(),
            Self::Pattern(pattern) => pattern.clone(),
            Self::Model(name) if Self::model_is_branch(name) => name.clone(),
            Self::Model(name) => name.to_uppercase(),
        }
    }

    fn display_id(&self) -> String {
        match self {
            Self::Name(branch) => branch.as_str().to_string(),
            Self::Pattern(pattern) => pattern.clone(),
            Self::Model(name) => capitalize(name),
        }
    }

    /// Wire representation used in restriction payloads.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id(),
            "displayId": self.display_id(),
            "type": { "id": self.type_id(), "name": self.type_name() },
            "active": true,
        })
    }

    /// Whether a listed matcher object designates the same branches.
    pub fn is_same(&self, listed: &Value) -> bool {
        let id = listed.get("id").and_then(Value::as_str);
        let type_id = listed.pointer("/type/id").and_then(Value::as_str);
        id == Some(self.id().as_str()) && type_id == Some(self.type_id())
    }
}

impl fmt::Display for BranchMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.type_id(), self.id())
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevent_phrases() {
        assert_eq!(
            "rewriting history".parse::<RestrictionKind>(),
            Ok(RestrictionKind::RewritingHistory)
        );
        assert_eq!(
            "changes-without-a-pull-request".parse::<RestrictionKind>(),
            Ok(RestrictionKind::ChangesWithoutPullRequest)
        );
        assert_eq!("read-only".parse::<RestrictionKind>(), Ok(RestrictionKind::AllChanges));
        assert!("everything".parse::<RestrictionKind>().is_err());
    }

    #[test]
    fn test_matcher_ids() {
        let name = BranchMatcher::Name(BranchName::new("master"));
        assert_eq!(name.id(), "refs/heads/master");
        assert_eq!(name.type_id(), "BRANCH");

        let production = BranchMatcher::Model("production".into());
        assert_eq!(production.type_id(), "MODEL_BRANCH");
        assert_eq!(production.id(), "production");

        let bugfix = BranchMatcher::Model("bugfix".into());
        assert_eq!(bugfix.type_id(), "MODEL_CATEGORY");
        assert_eq!(bugfix.id(), "BUGFIX");
        assert_eq!(bugfix.to_json()["displayId"], "Bugfix");
    }

    #[test]
    fn test_is_same_compares_id_and_type() {
        let matcher = BranchMatcher::Pattern("release/*".into());
        let listed = json!({"id": "release/*", "type": {"id": "PATTERN"}});
        let other_type = json!({"id": "release/*", "type": {"id": "BRANCH"}});
        assert!(matcher.is_same(&listed));
        assert!(!matcher.is_same(&other_type));
    }
}
