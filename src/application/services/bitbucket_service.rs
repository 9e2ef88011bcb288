use tracing::debug;
use url::Url;

use crate::application::reconciler::{send_mutation, Reconciler};
use crate::common::error::{Operation, TaskError};
use crate::common::result::TaskResult;
use crate::domain::entities::item::{i64_at, Item};
use crate::domain::value_objects::credentials::Credentials;
use crate::infrastructure::filesystem::config_store::ConnectionConfig;
use crate::infrastructure::http::endpoints::Endpoints;
use crate::infrastructure::http::executor::{RequestExecutor, ResponseEnvelope, RetryingExecutor};
use crate::infrastructure::http::pagination::{PaginatedLister, DEFAULT_PAGE_SIZE};
use crate::infrastructure::http::request::RequestSpec;
use crate::infrastructure::http::transport::ReqwestTransport;

/// Everything a task needs to talk to one Bitbucket Server.
pub struct BitbucketService {
    executor: Box<dyn RequestExecutor>,
    endpoints: Endpoints,
    credentials: Credentials,
    page_size: u32,
    check_mode: bool,
}

impl BitbucketService {
    pub fn new(
        executor: Box<dyn RequestExecutor>,
        endpoints: Endpoints,
        credentials: Credentials,
    ) -> Self {
        Self {
            executor,
            endpoints,
            credentials,
            page_size: DEFAULT_PAGE_SIZE,
            check_mode: false,
        }
    }

    /// Builds the reqwest transport and retry policy described by `config`.
    pub fn from_config(config: &ConnectionConfig, check_mode: bool) -> TaskResult<Self> {
        let transport_config = config.transport_config()?;
        let transport = ReqwestTransport::new(&transport_config)?;
        let executor = RetryingExecutor::new(Box::new(transport), config.retry_policy());
        let endpoints = Endpoints::new(transport_config.base_url.clone())?;
        debug!(
            "Connecting to {} (check mode: {})",
            transport_config.base_url, check_mode
        );

        Ok(Self::new(
            Box::new(executor),
            endpoints,
            transport_config.credentials,
        )
        .with_page_size(config.page_size)
        .with_check_mode(check_mode))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn executor(&self) -> &dyn RequestExecutor {
        self.executor.as_ref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.executor(), self.check_mode)
    }

    pub fn lister(&self) -> PaginatedLister<'_> {
        PaginatedLister::new(self.executor(), self.page_size)
    }

    pub fn list(&self, url: &Url, extra_query: &[(&str, &str)], context: &str) -> TaskResult<Vec<Item>> {
        self.lister().list_all(url, extra_query, context)
    }

    /// Sends a mutation outside the reconciler (follow-up calls such as setting the default
    /// branch after creating it).
    pub fn send(
        &self,
        request: &RequestSpec,
        operation: Operation,
        entity: &str,
    ) -> TaskResult<ResponseEnvelope> {
        send_mutation(self.executor(), request, operation, entity)
    }

    /// Single-object GET. 404 is `None` unless `fail_when_not_exists`.
    pub fn fetch(
        &self,
        request: &RequestSpec,
        entity: &str,
        fail_when_not_exists: bool,
    ) -> TaskResult<Option<Item>> {
        let response = self.executor.execute(request)?;
        match response.status {
            200 => Ok(Some(response.into_json())),
            404 if fail_when_not_exists => Err(TaskError::not_found(entity)),
            404 => Ok(None),
            status => Err(TaskError::lookup(entity, status, response.error_message())),
        }
    }

    pub fn get_project(&self, key: &str, fail_when_not_exists: bool) -> TaskResult<Option<Item>> {
        self.fetch(
            &self.endpoints.get_project(key),
            &format!("Project `{key}`"),
            fail_when_not_exists,
        )
    }

    pub fn get_repository(
        &self,
        key: &str,
        slug: &str,
        fail_when_not_exists: bool,
    ) -> TaskResult<Option<Item>> {
        self.fetch(
            &self.endpoints.get_repository(key, slug),
            &format!("Repository `{slug}`"),
            fail_when_not_exists,
        )
    }

    pub fn require_project(&self, key: &str) -> TaskResult<Item> {
        self.get_project(key, false)?
            .ok_or_else(|| TaskError::not_found(format!("Project `{key}`")))
    }

    /// Checks the project first so a missing project is reported as such.
    pub fn require_repository(&self, key: &str, slug: &str) -> TaskResult<Item> {
        self.require_project(key)?;
        self.get_repository(key, slug, false)?
            .ok_or_else(|| TaskError::not_found(format!("Repository `{slug}`")))
    }

    /// Numeric id of the user with `slug`.
    pub fn user_id(&self, slug: &str) -> TaskResult<i64> {
        let entity = format!("User `{slug}`");
        let user = self
            .fetch(&self.endpoints.get_user(slug), &entity, false)?
            .ok_or_else(|| TaskError::not_found(entity.as_str()))?;
        i64_at(&user, "/id").ok_or_else(|| {
            TaskError::internal_error(format!("{entity} was returned without an id"))
        })
    }

    /// Raw file bytes at `at` (default branch when `None`); `None` when missing.
    pub fn raw_file(
        &self,
        key: &str,
        slug: &str,
        path: &str,
        at: Option<&str>,
    ) -> TaskResult<Option<Vec<u8>>> {
        let request = self.endpoints.raw_file(key, slug, path, at);
        let response = self.executor.execute(&request)?;
        match response.status {
            200 => Ok(Some(response.raw)),
            404 => Ok(None),
            status => Err(TaskError::lookup(
                format!("file `{path}` of {key}/{slug}"),
                status,
                response.error_message(),
            )),
        }
    }
}
