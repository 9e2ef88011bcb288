use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::infrastructure::http::transport::TransportError;

/// Why a paginated listing was rejected by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingErrorKind {
    /// 400: the requested scope cannot be listed here (e.g. the path is not a directory)
    ScopeNotListable,
    /// 404: the parent resource does not exist
    ParentMissing,
    /// Any other non-200 status, or a 200 without a JSON body
    Generic,
}

impl ListingErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::ScopeNotListable,
            404 => Self::ParentMissing,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for ListingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ScopeNotListable => "scope is not listable",
            Self::ParentMissing => "parent resource does not exist",
            Self::Generic => "listing failed",
        };
        f.write_str(text)
    }
}

/// The documented meaning of a rejected create/update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationErrorKind {
    /// 401/403
    PermissionDenied,
    /// 404
    ParentMissing,
    /// 409
    Conflict,
    /// 400
    Malformed,
    Unexpected,
}

impl MutationErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied,
            404 => Self::ParentMissing,
            409 => Self::Conflict,
            400 => Self::Malformed,
            _ => Self::Unexpected,
        }
    }
}

impl fmt::Display for MutationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PermissionDenied => "insufficient permission",
            Self::ParentMissing => "parent resource does not exist",
            Self::Conflict => "conflicting state or validation failed",
            Self::Malformed => "malformed request",
            Self::Unexpected => "unexpected response",
        };
        f.write_str(text)
    }
}

/// Mutating operation kinds reported in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to list {context}: {kind} (HTTP {status}){}", detail_suffix(.message))]
    Listing {
        kind: ListingErrorKind,
        status: u16,
        context: String,
        message: Option<String>,
    },

    #[error("Ambiguous match for {entity}: {count} existing objects match, expected at most one")]
    AmbiguousMatch { entity: String, count: usize },

    #[error("Failed to {operation} {entity}: {kind} (HTTP {status}){}", detail_suffix(.message))]
    Mutation {
        kind: MutationErrorKind,
        status: u16,
        operation: Operation,
        entity: String,
        message: Option<String>,
    },

    #[error("Failed to retrieve {entity} (HTTP {status}){}", detail_suffix(.message))]
    Lookup {
        entity: String,
        status: u16,
        message: Option<String>,
    },

    #[error("{entity} does not exist")]
    NotFound { entity: String },

    #[error("Git operation failed: {message}")]
    VersionControl {
        message: String,
        #[source]
        source: Option<git2::Error>,
    },

    #[error("File system operation failed: {message}")]
    FileSystem {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {field} - {message}")]
    Validation {
        field: String,
        message: String,
        value: Option<String>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

impl TaskError {
    pub fn listing(status: u16, context: impl Into<String>, message: Option<String>) -> Self {
        Self::Listing {
            kind: ListingErrorKind::from_status(status),
            status,
            context: context.into(),
            message,
        }
    }

    pub fn mutation(
        status: u16,
        operation: Operation,
        entity: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self::Mutation {
            kind: MutationErrorKind::from_status(status),
            status,
            operation,
            entity: entity.into(),
            message,
        }
    }

    pub fn lookup(entity: impl Into<String>, status: u16, message: Option<String>) -> Self {
        Self::Lookup {
            entity: entity.into(),
            status,
            message,
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn ambiguous_match(entity: impl Into<String>, count: usize) -> Self {
        Self::AmbiguousMatch {
            entity: entity.into(),
            count,
        }
    }

    pub fn version_control(message: impl Into<String>) -> Self {
        Self::VersionControl {
            message: message.into(),
            source: None,
        }
    }

    pub fn version_control_with_source(message: impl Into<String>, source: git2::Error) -> Self {
        Self::VersionControl {
            message: format!("{}: {}", message.into(), source.message()),
            source: Some(source),
        }
    }

    pub fn filesystem_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::FileSystem {
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn validation_error(
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
            value,
        }
    }

    pub fn serialization_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Listing sub-kind, if this is a listing failure.
    pub fn listing_kind(&self) -> Option<ListingErrorKind> {
        match self {
            Self::Listing { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Mutation sub-kind, if this is a rejected mutation.
    pub fn mutation_kind(&self) -> Option<MutationErrorKind> {
        match self {
            Self::Mutation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<git2::Error> for TaskError {
    fn from(error: git2::Error) -> Self {
        Self::version_control_with_source("Git operation failed", error)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(error: std::io::Error) -> Self {
        Self::filesystem_error_with_source("File system operation failed", None, error)
    }
}

impl From<serde_yaml::Error> for TaskError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::serialization_error_with_source("YAML serialization failed", error)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization_error_with_source("JSON serialization failed", error)
    }
}

impl From<regex::Error> for TaskError {
    fn from(error: regex::Error) -> Self {
        Self::validation_error("pattern", error.to_string(), None)
    }
}
