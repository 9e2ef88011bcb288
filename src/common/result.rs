use crate::common::error::TaskError;

/// Result alias used across the crate.
///
/// # Examples
///
/// ```
/// use bbtask::common::result::TaskResult;
/// use bbtask::common::error::TaskError;
///
/// fn lookup(key: &str) -> TaskResult<String> {
///     if key.is_empty() {
///         return Err(TaskError::validation_error("project_key", "must not be empty", None));
///     }
///     Ok(key.to_uppercase())
/// }
///
/// assert_eq!(lookup("foo").unwrap(), "FOO");
/// assert!(lookup("").is_err());
/// ```
pub type TaskResult<T> = Result<T, TaskError>;

/// Conversions from `Option` into `TaskResult`.
pub trait OptionExt<T> {
    fn ok_or_validation_error(
        self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> TaskResult<T>;

    fn ok_or_internal_error(self, message: impl Into<String>) -> TaskResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_validation_error(
        self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> TaskResult<T> {
        self.ok_or_else(|| TaskError::validation_error(field, message, None))
    }

    fn ok_or_internal_error(self, message: impl Into<String>) -> TaskResult<T> {
        self.ok_or_else(|| TaskError::internal_error(message))
    }
}

/// Conversions from library results into `TaskResult` with context.
pub trait ResultExt<T, E> {
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> TaskResult<T>
    where
        E: Into<std::io::Error>;

    fn with_git_error(self, message: impl Into<String>) -> TaskResult<T>
    where
        E: Into<git2::Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> TaskResult<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| TaskError::filesystem_error_with_source(message, path, e.into()))
    }

    fn with_git_error(self, message: impl Into<String>) -> TaskResult<T>
    where
        E: Into<git2::Error>,
    {
        self.map_err(|e| TaskError::version_control_with_source(message, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_option_ext_ok_or_validation_error() {
        let none_value: Option<String> = None;
        let result = none_value.ok_or_validation_error("field", "required");
        if let Err(TaskError::Validation { field, message, .. }) = result {
            assert_eq!(field, "field");
            assert_eq!(message, "required");
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_with_filesystem_error_keeps_path() {
        let io: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let path = PathBuf::from("/tmp/repo");
        match io.with_filesystem_error("cannot remove", Some(path.clone())) {
            Err(TaskError::FileSystem { path: Some(p), .. }) => assert_eq!(p, path),
            other => panic!("Expected FileSystem error, got {other:?}"),
        }
    }

    #[test]
    fn test_with_git_error_includes_native_message() {
        let git: Result<(), git2::Error> = Err(git2::Error::from_str("reference not found"));
        let error = git.with_git_error("checkout failed").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Git operation failed: checkout failed: reference not found"
        );
    }
}
