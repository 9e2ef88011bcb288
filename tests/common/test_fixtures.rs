//! Test fixtures for creating test data
//!
//! Services wired to a [`ScriptedTransport`], canned server records, and local git
//! repositories in temporary directories.

use bbtask::application::services::BitbucketService;
use bbtask::domain::value_objects::credentials::Credentials;
use bbtask::infrastructure::git::{Committer, GitRepository};
use bbtask::infrastructure::http::executor::{RetryPolicy, RetryingExecutor, Sleeper};
use bbtask::infrastructure::http::Endpoints;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

use super::mock_services::ScriptedTransport;

pub const BASE_URL: &str = "https://bitbucket.example.com";

/// Records requested delays instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    pub delays: Arc<Mutex<Vec<Duration>>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Test fixture for services talking to a scripted server
pub struct ServiceFixture {
    pub transport: ScriptedTransport,
    pub sleeper: RecordingSleeper,
    pub policy: RetryPolicy,
}

impl ServiceFixture {
    pub fn new() -> Self {
        Self {
            transport: ScriptedTransport::new(),
            sleeper: RecordingSleeper::default(),
            policy: RetryPolicy {
                max_retries: 3,
                delay: Duration::from_secs(2),
            },
        }
    }

    /// A service over the real retrying executor and the scripted transport.
    pub fn service(&self, check_mode: bool) -> BitbucketService {
        let executor = RetryingExecutor::with_sleeper(
            Box::new(self.transport.clone()),
            self.policy,
            Box::new(self.sleeper.clone()),
        );
        let endpoints = Endpoints::new(Url::parse(BASE_URL).unwrap()).unwrap();
        BitbucketService::new(Box::new(executor), endpoints, Credentials::bearer("t0ken"))
            .with_page_size(2)
            .with_check_mode(check_mode)
    }
}

/// Canned server records
pub struct RecordFixture;

impl RecordFixture {
    pub fn project(key: &str) -> Value {
        json!({"key": key, "id": 1, "name": key, "public": false, "type": "NORMAL"})
    }

    pub fn repository(key: &str, slug: &str) -> Value {
        json!({"slug": slug, "name": slug, "id": 7, "project": {"key": key}})
    }

    pub fn branch(name: &str) -> Value {
        json!({
            "id": format!("refs/heads/{name}"),
            "displayId": name,
            "type": "BRANCH",
            "isDefault": name == "master",
        })
    }

    /// One page of a paginated collection
    pub fn page(values: Value, next_page_start: Option<u64>) -> Value {
        match next_page_start {
            Some(next) => json!({"values": values, "isLastPage": false, "nextPageStart": next}),
            None => json!({"values": values, "isLastPage": true}),
        }
    }
}

/// Test fixture for local git repositories
pub struct GitFixture {
    pub temp_dir: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn committer() -> Committer {
        Committer::new("Jane Doe", "jane@example.com")
    }

    /// Bare repository standing in for the server side of a push.
    pub fn bare_remote(&self) -> PathBuf {
        let path = self.path("remote.git");
        git2::Repository::init_bare(&path).unwrap();
        path
    }

    /// Working repository with one uncommitted file and `origin` set to `remote`.
    pub fn working_copy(&self, remote: Option<&Path>) -> PathBuf {
        let path = self.path("work");
        let repo = GitRepository::init(&path).unwrap();
        std::fs::write(path.join("README.md"), "# demo\n").unwrap();
        if let Some(remote) = remote {
            repo.ensure_remote("origin", remote.to_str().unwrap()).unwrap();
        }
        path
    }
}
