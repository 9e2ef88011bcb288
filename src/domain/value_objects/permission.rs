use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported permission `{value}`, expected one of {expected}")]
pub struct PermissionError {
    value: String,
    expected: &'static str,
}

/// Repository-level permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepositoryPermission {
    RepoRead,
    RepoWrite,
    RepoAdmin,
}

impl RepositoryPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepoRead => "REPO_READ",
            Self::RepoWrite => "REPO_WRITE",
            Self::RepoAdmin => "REPO_ADMIN",
        }
    }
}

impl fmt::Display for RepositoryPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryPermission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REPO_READ" => Ok(Self::RepoRead),
            "REPO_WRITE" => Ok(Self::RepoWrite),
            "REPO_ADMIN" => Ok(Self::RepoAdmin),
            _ => Err(PermissionError {
                value: s.to_string(),
                expected: "REPO_READ, REPO_WRITE, REPO_ADMIN",
            }),
        }
    }
}

/// Which permission collection an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    Users,
    Groups,
}

impl PermissionScope {
    pub const ALL: [PermissionScope; 2] = [PermissionScope::Users, PermissionScope::Groups];

    /// Path segment of the collection endpoint.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Groups => "groups",
        }
    }

    /// Key holding the grantee inside a listed entry (`user` / `group`).
    pub fn entry_key(&self) -> &'static str {
        match self {
            Self::Users => "user",
            Self::Groups => "group",
        }
    }
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A user or group receiving a permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grantee {
    User(String),
    Group(String),
}

impl Grantee {
    pub fn scope(&self) -> PermissionScope {
        match self {
            Self::User(_) => PermissionScope::Users,
            Self::Group(_) => PermissionScope::Groups,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::User(name) | Self::Group(name) => name,
        }
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "user `{name}`"),
            Self::Group(name) => write!(f, "group `{name}`"),
        }
    }
}
