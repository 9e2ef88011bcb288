//! Repository file search and retrieval over the REST API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::wildcard;
use crate::application::services::BitbucketService;
use crate::common::error::{ListingErrorKind, TaskError};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;

const ANY_FILE: &str = ".+";

/// Settings for the `find` task
#[derive(Debug, Clone)]
pub struct FindConfig {
    pub project_key: String,
    pub repository: String,
    /// Directory to search below; repository root when empty
    pub path: String,
    /// Branch, tag or commit; default branch when `None`
    pub at: Option<String>,
    pub patterns: Vec<String>,
    /// Only keep files whose content matches this regex
    pub contains: Option<String>,
}

impl FindConfig {
    pub fn new(project_key: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            repository: repository.into(),
            path: String::new(),
            at: None,
            patterns: Vec::new(),
            contains: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_at(mut self, at: Option<String>) -> Self {
        self.at = at;
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_contains(mut self, contains: Option<String>) -> Self {
        self.contains = contains;
        self
    }

    fn patterns(&self) -> Vec<String> {
        match wildcard(&self.patterns).as_slice() {
            [only] if only == "*" => vec![ANY_FILE.to_string()],
            filters => filters.to_vec(),
        }
    }

    /// Listed paths are relative to `path`; raw downloads need them from the root.
    fn repository_path(&self, listed: &str) -> String {
        let base = self.path.trim_matches('/');
        if base.is_empty() {
            listed.to_string()
        } else {
            format!("{base}/{listed}")
        }
    }
}

pub struct FindUseCase {
    config: FindConfig,
}

impl FindUseCase {
    pub fn new(config: FindConfig) -> Self {
        Self { config }
    }

    fn list_files(&self, service: &BitbucketService) -> TaskResult<Vec<String>> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let mut query = Vec::new();
        if let Some(at) = config.at.as_deref() {
            query.push(("at", at));
        }
        let listed = service
            .list(
                &service.endpoints().files(key, slug, &config.path),
                &query,
                &format!("files of repository {key}/{slug}"),
            )
            .map_err(|error| match error.listing_kind() {
                Some(ListingErrorKind::ScopeNotListable) => TaskError::validation_error(
                    "path",
                    "The path requested is not a directory at the supplied commit",
                    Some(config.path.clone()),
                ),
                Some(ListingErrorKind::ParentMissing) => TaskError::not_found(format!(
                    "Path `{}` of repository {key}/{slug}",
                    config.path
                )),
                _ => error,
            })?;
        Ok(listed
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        let patterns = config.patterns();
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let contains = config.contains.as_deref().map(Regex::new).transpose()?;

        service.require_repository(key, slug)?;
        let all_files = self.list_files(service)?;
        debug!("{} files listed in {key}/{slug}", all_files.len());

        let mut found: Vec<String> = Vec::new();
        for pattern in &compiled {
            for file in all_files.iter().filter(|f| pattern.is_match(f)) {
                if found.contains(file) {
                    continue;
                }
                if let Some(contains) = &contains {
                    let path = config.repository_path(file);
                    let Some(bytes) = service.raw_file(key, slug, &path, config.at.as_deref())?
                    else {
                        continue;
                    };
                    if !contains.is_match(&String::from_utf8_lossy(&bytes)) {
                        continue;
                    }
                }
                found.push(file.clone());
            }
        }

        Ok(TaskOutcome::unchanged()
            .with_field("project_key", key)
            .with_field("repository", slug)
            .with_field("at", config.at.clone())
            .with_field("patterns", patterns)
            .with_field("contains", config.contains.clone())
            .with_field("files", found))
    }
}

/// Settings for the `slurp` task
#[derive(Debug, Clone)]
pub struct SlurpConfig {
    pub project_key: String,
    pub repository: String,
    pub src: String,
    pub at: Option<String>,
}

pub struct SlurpUseCase {
    config: SlurpConfig,
}

impl SlurpUseCase {
    pub fn new(config: SlurpConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        let config = &self.config;
        let (key, slug) = (config.project_key.as_str(), config.repository.as_str());
        service.require_repository(key, slug)?;
        let bytes = service
            .raw_file(key, slug, &config.src, config.at.as_deref())?
            .ok_or_else(|| {
                TaskError::not_found(format!("File `{}` of repository {key}/{slug}", config.src))
            })?;

        Ok(TaskOutcome::unchanged()
            .with_field("content", STANDARD.encode(bytes))
            .with_field("encoding", "base64")
            .with_field("source", config.src.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::bitbucket_service::testing::scripted_service;
    use crate::infrastructure::http::request::{Method, RawResponse};
    use crate::infrastructure::http::scripted::ScriptedExecutor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FILES: &str = "/rest/api/1.0/projects/FOO/repos/bar/files";
    const RAW: &str = "/rest/api/1.0/projects/FOO/repos/bar/raw";

    fn repository() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .on(Method::Get, "/rest/api/1.0/projects/FOO", 200, json!({"key": "FOO"}))
            .on(
                Method::Get,
                "/rest/api/1.0/projects/FOO/repos/bar",
                200,
                json!({"slug": "bar"}),
            )
    }

    fn listing() -> Value {
        ScriptedExecutor::page(json!(["README.md", "src/lib.rs", "src/main.rs", "Cargo.toml"]))
    }

    #[test]
    fn test_patterns_deduplicate_in_order() {
        let scripted = repository().on(Method::Get, FILES, 200, listing());
        let (service, _) = scripted_service(scripted, false);
        let outcome = FindUseCase::new(
            FindConfig::new("FOO", "bar").with_patterns(vec![r"\.rs$".into(), "^src/".into()]),
        )
        .execute(&service)
        .unwrap();
        assert_eq!(
            outcome.field("files"),
            Some(&json!(["src/lib.rs", "src/main.rs"]))
        );
    }

    #[test]
    fn test_default_pattern_matches_everything() {
        let scripted = repository().on(Method::Get, FILES, 200, listing());
        let (service, _) = scripted_service(scripted, false);
        let outcome = FindUseCase::new(FindConfig::new("FOO", "bar"))
            .execute(&service)
            .unwrap();
        assert_eq!(outcome.field("patterns"), Some(&json!([".+"])));
        assert_eq!(outcome.field("files").unwrap().as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_contains_greps_raw_content() {
        let scripted = repository()
            .on(Method::Get, FILES, 200, listing())
            .on_raw(Method::Get, &format!("{RAW}/src/lib.rs"), RawResponse::new(200, "pub mod http;\n"))
            .on_raw(Method::Get, &format!("{RAW}/src/main.rs"), RawResponse::new(200, "fn main() {}\n"));
        let (service, executor) = scripted_service(scripted, false);
        let outcome = FindUseCase::new(
            FindConfig::new("FOO", "bar")
                .with_patterns(vec![r"\.rs$".into()])
                .with_contains(Some(r"fn\s+main".into()))
                .with_at(Some("develop".into())),
        )
        .execute(&service)
        .unwrap();
        assert_eq!(outcome.field("files"), Some(&json!(["src/main.rs"])));
        assert!(executor
            .requests()
            .iter()
            .filter(|r| r.url.path().starts_with(RAW))
            .all(|r| r.url.query() == Some("at=develop")));
    }

    #[test]
    fn test_file_as_path_is_not_a_directory() {
        let scripted = repository().on(Method::Get, &format!("{FILES}/README.md"), 400, json!({}));
        let (service, _) = scripted_service(scripted, false);
        let error = FindUseCase::new(FindConfig::new("FOO", "bar").with_path("README.md"))
            .execute(&service)
            .unwrap_err();
        assert!(matches!(error, TaskError::Validation { field, .. } if field == "path"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected_before_any_request() {
        let (service, executor) = scripted_service(ScriptedExecutor::new(), false);
        let error = FindUseCase::new(FindConfig::new("FOO", "bar").with_patterns(vec!["(".into()]))
            .execute(&service)
            .unwrap_err();
        assert!(matches!(error, TaskError::Validation { .. }));
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn test_slurp_encodes_base64() {
        let scripted = repository().on_raw(
            Method::Get,
            &format!("{RAW}/README.md"),
            RawResponse::new(200, "hello"),
        );
        let (service, _) = scripted_service(scripted, false);
        let outcome = SlurpUseCase::new(SlurpConfig {
            project_key: "FOO".into(),
            repository: "bar".into(),
            src: "README.md".into(),
            at: None,
        })
        .execute(&service)
        .unwrap();
        assert_eq!(outcome.field("content"), Some(&json!("aGVsbG8=")));
        assert_eq!(outcome.field("encoding"), Some(&json!("base64")));
    }

    #[test]
    fn test_slurp_missing_file() {
        let (service, _) = scripted_service(repository(), false);
        let error = SlurpUseCase::new(SlurpConfig {
            project_key: "FOO".into(),
            repository: "bar".into(),
            src: "missing.txt".into(),
            at: None,
        })
        .execute(&service)
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "File `missing.txt` of repository FOO/bar does not exist"
        );
    }
}
