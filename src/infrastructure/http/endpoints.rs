//! Typed Bitbucket Server endpoints.
//!
//! Collection endpoints return a [`Url`] for the [`PaginatedLister`]; single-object
//! operations return a ready [`RequestSpec`]. Path segments are percent-encoded by `url`.
//!
//! [`PaginatedLister`]: super::pagination::PaginatedLister

use serde_json::{json, Value};
use url::Url;

use super::request::{FormPart, Method, RequestSpec};
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::value_objects::branch_name::BranchName;
use crate::domain::value_objects::permission::{Grantee, PermissionScope};

const API: [&str; 3] = ["rest", "api", "1.0"];
const BRANCH_PERMISSIONS: [&str; 3] = ["rest", "branch-permissions", "2.0"];
const DEFAULT_REVIEWERS: [&str; 3] = ["rest", "default-reviewers", "1.0"];
const APPLINKS: [&str; 3] = ["rest", "applinks", "3.0"];
const APPLINKS_OAUTH: [&str; 3] = ["rest", "applinks-oauth", "1.0"];
const EMBEDDED_CROWD: [&str; 4] = ["plugins", "servlet", "embedded-crowd", "directories"];

/// Project- or repository-level target of branch restrictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestrictionScope {
    Project(String),
    Repository(String, String),
}

impl RestrictionScope {
    pub fn new(project_key: &str, repository: Option<&str>) -> Self {
        match repository {
            Some(slug) => Self::Repository(project_key.to_string(), slug.to_string()),
            None => Self::Project(project_key.to_string()),
        }
    }

    /// `scope.type` as reported in listed restrictions.
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Project(_) => "PROJECT",
            Self::Repository(..) => "REPOSITORY",
        }
    }

    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Project(key) => vec!["projects", key],
            Self::Repository(key, slug) => vec!["projects", key, "repos", slug],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: Url) -> TaskResult<Self> {
        if base.cannot_be_a_base() {
            return Err(TaskError::config_error(format!(
                "Server URL `{base}` cannot carry a path"
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn join(&self, prefix: &[&str], segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(prefix).extend(segments);
        }
        url
    }

    fn api(&self, segments: &[&str]) -> Url {
        self.join(&API, segments)
    }

    fn repo_api(&self, key: &str, slug: &str, rest: &[&str]) -> Url {
        let mut segments = vec!["projects", key, "repos", slug];
        segments.extend_from_slice(rest);
        self.api(&segments)
    }

    // Projects

    pub fn projects(&self) -> Url {
        self.api(&["projects"])
    }

    pub fn get_project(&self, key: &str) -> RequestSpec {
        RequestSpec::get(self.api(&["projects", key]))
    }

    pub fn create_project(&self, body: Value) -> RequestSpec {
        RequestSpec::post(self.projects(), body)
    }

    pub fn update_project(&self, key: &str, body: Value) -> RequestSpec {
        RequestSpec::put(self.api(&["projects", key]), body)
    }

    pub fn delete_project(&self, key: &str) -> RequestSpec {
        RequestSpec::delete(self.api(&["projects", key]))
    }

    pub fn project_permissions(&self, key: &str, scope: PermissionScope) -> Url {
        self.api(&["projects", key, "permissions", scope.segment()])
    }

    // Repositories

    pub fn repositories(&self, key: &str) -> Url {
        self.api(&["projects", key, "repos"])
    }

    pub fn get_repository(&self, key: &str, slug: &str) -> RequestSpec {
        RequestSpec::get(self.repo_api(key, slug, &[]))
    }

    pub fn create_repository(&self, key: &str, body: Value) -> RequestSpec {
        RequestSpec::post(self.repositories(key), body)
    }

    pub fn delete_repository(&self, key: &str, slug: &str) -> RequestSpec {
        RequestSpec::delete(self.repo_api(key, slug, &[]))
    }

    pub fn repository_permissions(&self, key: &str, slug: &str, scope: PermissionScope) -> Url {
        self.repo_api(key, slug, &["permissions", scope.segment()])
    }

    pub fn grant_repository_permission(
        &self,
        key: &str,
        slug: &str,
        grantee: &Grantee,
        permission: &str,
    ) -> RequestSpec {
        RequestSpec::new(
            Method::Put,
            self.repository_permissions(key, slug, grantee.scope()),
        )
        .with_query(&[("name", grantee.name()), ("permission", permission)])
    }

    pub fn revoke_repository_permission(
        &self,
        key: &str,
        slug: &str,
        grantee: &Grantee,
    ) -> RequestSpec {
        RequestSpec::delete(self.repository_permissions(key, slug, grantee.scope()))
            .with_query(&[("name", grantee.name())])
    }

    // Branches

    pub fn branches(&self, key: &str, slug: &str) -> Url {
        self.repo_api(key, slug, &["branches"])
    }

    pub fn create_branch(
        &self,
        key: &str,
        slug: &str,
        name: &BranchName,
        start_point: &BranchName,
    ) -> RequestSpec {
        RequestSpec::post(
            self.branches(key, slug),
            json!({ "name": name.as_str(), "startPoint": start_point.to_ref() }),
        )
    }

    pub fn set_default_branch(&self, key: &str, slug: &str, branch: &BranchName) -> RequestSpec {
        RequestSpec::put(
            self.repo_api(key, slug, &["branches", "default"]),
            json!({ "id": branch.to_ref() }),
        )
    }

    // Branch restrictions

    pub fn restrictions(&self, scope: &RestrictionScope) -> Url {
        let mut segments = scope.segments();
        segments.push("restrictions");
        self.join(&BRANCH_PERMISSIONS, &segments)
    }

    pub fn create_restriction(&self, scope: &RestrictionScope, body: Value) -> RequestSpec {
        RequestSpec::post(self.restrictions(scope), body)
    }

    pub fn delete_restriction(&self, scope: &RestrictionScope, id: &str) -> RequestSpec {
        let mut segments = scope.segments();
        segments.extend_from_slice(&["restrictions", id]);
        RequestSpec::delete(self.join(&BRANCH_PERMISSIONS, &segments))
    }

    // Webhooks

    pub fn webhooks(&self, key: &str, slug: &str) -> Url {
        self.repo_api(key, slug, &["webhooks"])
    }

    pub fn create_webhook(&self, key: &str, slug: &str, body: Value) -> RequestSpec {
        RequestSpec::post(self.webhooks(key, slug), body)
    }

    pub fn update_webhook(&self, key: &str, slug: &str, id: &str, body: Value) -> RequestSpec {
        RequestSpec::put(self.repo_api(key, slug, &["webhooks", id]), body)
    }

    pub fn delete_webhook(&self, key: &str, slug: &str, id: &str) -> RequestSpec {
        RequestSpec::delete(self.repo_api(key, slug, &["webhooks", id]))
    }

    // Pull requests

    pub fn pull_requests(&self, key: &str, slug: &str) -> Url {
        self.repo_api(key, slug, &["pull-requests"])
    }

    pub fn create_pull_request(&self, key: &str, slug: &str, body: Value) -> RequestSpec {
        RequestSpec::post(self.pull_requests(key, slug), body)
    }

    /// Deleting requires the pull request's current `version`.
    pub fn delete_pull_request(&self, key: &str, slug: &str, id: &str, version: i64) -> RequestSpec {
        RequestSpec::delete(self.repo_api(key, slug, &["pull-requests", id]))
            .with_json(json!({ "version": version }))
    }

    // Default reviewers

    pub fn reviewer_conditions(&self, key: &str) -> Url {
        self.join(&DEFAULT_REVIEWERS, &["projects", key, "conditions"])
    }

    pub fn create_reviewer_condition(&self, key: &str, body: Value) -> RequestSpec {
        RequestSpec::post(
            self.join(&DEFAULT_REVIEWERS, &["projects", key, "condition"]),
            body,
        )
    }

    pub fn update_reviewer_condition(&self, key: &str, id: &str, body: Value) -> RequestSpec {
        RequestSpec::put(
            self.join(&DEFAULT_REVIEWERS, &["projects", key, "condition", id]),
            body,
        )
    }

    pub fn delete_reviewer_condition(&self, key: &str, id: &str) -> RequestSpec {
        RequestSpec::delete(self.join(&DEFAULT_REVIEWERS, &["projects", key, "condition", id]))
    }

    // Users

    pub fn get_user(&self, slug: &str) -> RequestSpec {
        RequestSpec::get(self.api(&["users", slug]))
    }

    // Application links

    pub fn application_links(&self) -> RequestSpec {
        RequestSpec::get(self.join(&APPLINKS, &["applinks"]))
    }

    pub fn create_application_link(&self, body: Value) -> RequestSpec {
        RequestSpec::put(self.join(&APPLINKS, &["applicationlink"]), body)
    }

    pub fn update_application_link(&self, id: &str, body: Value) -> RequestSpec {
        RequestSpec::put(self.join(&APPLINKS, &["applicationlink", id]), body)
    }

    pub fn configure_application_link_consumer(&self, id: &str, body: Value) -> RequestSpec {
        RequestSpec::put(
            self.join(
                &APPLINKS_OAUTH,
                &["applicationlink", id, "authentication", "consumer"],
            ),
            body,
        )
    }

    pub fn delete_application_link(&self, id: &str) -> RequestSpec {
        RequestSpec::delete(self.join(&APPLINKS, &["applinks", id]))
    }

    // Files

    /// File listing below `path` (repository root when empty).
    pub fn files(&self, key: &str, slug: &str, path: &str) -> Url {
        let mut rest = vec!["files"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_api(key, slug, &rest)
    }

    pub fn raw_file(&self, key: &str, slug: &str, path: &str, at: Option<&str>) -> RequestSpec {
        let mut rest = vec!["raw"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        let request = RequestSpec::get(self.repo_api(key, slug, &rest));
        match at {
            Some(at) => request.with_query(&[("at", at)]),
            None => request,
        }
    }

    /// Multipart PUT that creates or edits one file in a single commit.
    pub fn edit_file(&self, key: &str, slug: &str, path: &str, parts: Vec<FormPart>) -> RequestSpec {
        let mut rest = vec!["browse"];
        rest.extend(path.split('/').filter(|s| !s.is_empty()));
        RequestSpec::new(Method::Put, self.repo_api(key, slug, &rest)).with_multipart(parts)
    }

    /// Most recent commit touching `path`, reachable from `until` when given.
    pub fn latest_commit(&self, key: &str, slug: &str, path: &str, until: Option<&str>) -> RequestSpec {
        let mut query = vec![
            ("limit", "1"),
            ("followRenames", "true"),
            ("ignoreMissing", "true"),
            ("merges", "include"),
            ("path", path),
        ];
        if let Some(until) = until {
            query.push(("until", until));
        }
        RequestSpec::get(self.repo_api(key, slug, &["commits"])).with_query(&query)
    }

    // User directories

    /// Form login against the server root that opens a web session
    pub fn login(&self, username: &str, password: &str) -> RequestSpec {
        RequestSpec::new(Method::Post, self.join(&[], &[])).with_form(&[
            ("j_username", username),
            ("j_password", password),
            ("_atl_remember_me", "on"),
            ("submit", "Login"),
        ])
    }

    pub fn user_directories(&self) -> RequestSpec {
        RequestSpec::get(self.join(&EMBEDDED_CROWD, &["list"]))
    }

    pub fn sync_user_directory(&self, directory_id: &str, atl_token: &str) -> RequestSpec {
        RequestSpec::get(self.join(&EMBEDDED_CROWD, &["sync"]))
            .with_query(&[("directoryId", directory_id), ("atl_token", atl_token)])
    }

    // Git

    /// `{base}/scm/{project}/{repository}.git`
    pub fn clone_url(&self, key: &str, slug: &str) -> Url {
        let repo = format!("{slug}.git");
        self.join(&["scm"], &[key, repo.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new(Url::parse("https://bb.example.com/").unwrap()).unwrap()
    }

    #[test]
    fn test_api_urls() {
        let e = endpoints();
        assert_eq!(
            e.branches("FOO", "bar").as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/branches"
        );
        assert_eq!(
            e.get_project("FOO").url.as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO"
        );
    }

    #[test]
    fn test_context_path_is_kept() {
        let e = Endpoints::new(Url::parse("https://example.com/bitbucket").unwrap()).unwrap();
        assert_eq!(
            e.projects().as_str(),
            "https://example.com/bitbucket/rest/api/1.0/projects"
        );
        assert_eq!(
            e.clone_url("FOO", "bar").as_str(),
            "https://example.com/bitbucket/scm/FOO/bar.git"
        );
    }

    #[test]
    fn test_restriction_urls() {
        let e = endpoints();
        let repo = RestrictionScope::new("FOO", Some("bar"));
        let project = RestrictionScope::new("FOO", None);
        assert_eq!(
            e.restrictions(&repo).as_str(),
            "https://bb.example.com/rest/branch-permissions/2.0/projects/FOO/repos/bar/restrictions"
        );
        assert_eq!(
            e.delete_restriction(&project, "42").url.as_str(),
            "https://bb.example.com/rest/branch-permissions/2.0/projects/FOO/restrictions/42"
        );
        assert_eq!(repo.type_id(), "REPOSITORY");
    }

    #[test]
    fn test_permission_grant_query() {
        let e = endpoints();
        let spec = e.grant_repository_permission(
            "FOO",
            "bar",
            &Grantee::Group("dev team".into()),
            "REPO_WRITE",
        );
        assert_eq!(spec.method, Method::Put);
        assert_eq!(
            spec.url.as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/permissions/groups?name=dev+team&permission=REPO_WRITE"
        );
    }

    #[test]
    fn test_file_paths_are_split_into_segments() {
        let e = endpoints();
        assert_eq!(
            e.files("FOO", "bar", "src/main").as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/files/src/main"
        );
        assert_eq!(
            e.raw_file("FOO", "bar", "docs/read me.md", Some("develop")).url.as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/raw/docs/read%20me.md?at=develop"
        );
    }

    #[test]
    fn test_pull_request_delete_carries_version() {
        let spec = endpoints().delete_pull_request("FOO", "bar", "7", 3);
        assert_eq!(spec.json_body(), Some(&json!({"version": 3})));
    }

    #[test]
    fn test_file_edit_and_history_urls() {
        let e = endpoints();
        let edit = e.edit_file("FOO", "bar", "conf/app.yml", vec![FormPart::text("branch", "master")]);
        assert_eq!(edit.method, Method::Put);
        assert_eq!(
            edit.url.as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/browse/conf/app.yml"
        );
        assert_eq!(
            e.latest_commit("FOO", "bar", "conf/app.yml", Some("master")).url.as_str(),
            "https://bb.example.com/rest/api/1.0/projects/FOO/repos/bar/commits?limit=1&followRenames=true&ignoreMissing=true&merges=include&path=conf%2Fapp.yml&until=master"
        );
    }

    #[test]
    fn test_user_directory_sync_url() {
        assert_eq!(
            endpoints().sync_user_directory("32769", "abc123").url.as_str(),
            "https://bb.example.com/plugins/servlet/embedded-crowd/directories/sync?directoryId=32769&atl_token=abc123"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(Endpoints::new(Url::parse("mailto:admin@example.com").unwrap()).is_err());
    }
}
