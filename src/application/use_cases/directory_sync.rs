//! Trigger synchronisation of every user directory configured on the server.
//!
//! The embedded-crowd pages are only reachable from a logged-in web session, so the task
//! logs in with a form post and scrapes the sync links from the directory list page.

use regex::Regex;
use serde_json::json;
use tracing::info;

use crate::application::services::BitbucketService;
use crate::common::error::{Operation, TaskError};
use crate::common::result::TaskResult;
use crate::domain::entities::outcome::TaskOutcome;
use crate::domain::value_objects::credentials::Credentials;

/// `(directoryId, atl_token)` of each sync link on the directory list page.
pub fn sync_links(page: &str) -> TaskResult<Vec<(String, String)>> {
    let pattern = Regex::new(
        r"/plugins/servlet/embedded-crowd/directories/sync\?directoryId=(\d+)&(?:amp;)?atl_token=([^&\x22']+)",
    )?;
    let mut links: Vec<(String, String)> = Vec::new();
    for captures in pattern.captures_iter(page) {
        let link = (captures[1].to_string(), captures[2].to_string());
        if !links.contains(&link) {
            links.push(link);
        }
    }
    Ok(links)
}

#[derive(Debug, Default)]
pub struct DirectorySyncUseCase;

impl DirectorySyncUseCase {
    pub fn new() -> Self {
        Self
    }

    fn login(&self, service: &BitbucketService) -> TaskResult<()> {
        let Credentials::BasicAuth { username, password } = service.credentials() else {
            return Err(TaskError::validation_error(
                "username",
                "user directory synchronisation logs in with a username and password",
                None,
            ));
        };
        let response = service
            .executor()
            .execute(&service.endpoints().login(username, password))?;
        if response.status != 200 {
            return Err(TaskError::lookup(
                format!("web session for `{username}`"),
                response.status,
                response.error_message(),
            ));
        }
        Ok(())
    }

    pub fn execute(&self, service: &BitbucketService) -> TaskResult<TaskOutcome> {
        self.login(service)?;

        let endpoints = service.endpoints();
        let response = service.executor().execute(&endpoints.user_directories())?;
        if response.status != 200 {
            return Err(TaskError::lookup(
                "user directories",
                response.status,
                response.error_message(),
            ));
        }
        let page = String::from_utf8_lossy(&response.raw);
        let links = sync_links(&page)?;

        let mut synced = Vec::new();
        for (directory_id, token) in &links {
            let request = endpoints.sync_user_directory(directory_id, token);
            let status = if service.check_mode() {
                info!("[check mode] would synchronise user directory {}", directory_id);
                None
            } else {
                let response = service.send(
                    &request,
                    Operation::Update,
                    &format!("user directory {directory_id}"),
                )?;
                Some(response.status)
            };
            synced.push(json!({
                "directoryId": directory_id.parse::<u64>().ok(),
                "operation": format!("{}?{}", request.url.path(), request.url.query().unwrap_or_default()),
                "status": status,
            }));
        }

        let mut outcome = TaskOutcome::new(!links.is_empty());
        outcome.set_field("user_directories_synced", synced);
        Ok(outcome)
    }
}
