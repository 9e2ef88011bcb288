use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;
use validator::Validate;

use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::value_objects::credentials::Credentials;
use crate::infrastructure::http::executor::RetryPolicy;
use crate::infrastructure::http::pagination::DEFAULT_PAGE_SIZE;
use crate::infrastructure::http::transport::TransportConfig;

/// Configuration store related errors
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Configuration file not found at path: {0}")]
    ConfigFileNotFound(String),

    #[error("Configuration file read failed: {0}")]
    ReadFailed(String),

    #[error("YAML parsing failed: {0}")]
    YamlParsingFailed(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

impl From<ConfigStoreError> for TaskError {
    fn from(error: ConfigStoreError) -> Self {
        TaskError::config_error_with_source("Could not load connection settings", error)
    }
}

/// Server connection settings.
///
/// Read from YAML, then overlaid with flags and `BITBUCKET_*` environment variables.
#[derive(Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    #[validate(url)]
    pub url: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub username: Option<String>,

    pub password: Option<String>,

    #[validate(length(min = 1))]
    pub token: Option<String>,

    pub validate_certs: bool,

    pub use_proxy: bool,

    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,

    /// Attempts per request, the first one included
    #[validate(range(min = 1, max = 20))]
    pub retries: u32,

    #[validate(range(max = 300))]
    pub retry_delay_secs: u64,

    #[validate(range(min = 1, max = 10000))]
    pub page_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            token: None,
            validate_certs: true,
            use_proxy: true,
            timeout_secs: 30,
            retries: 3,
            retry_delay_secs: 5,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("validate_certs", &self.validate_certs)
            .field("use_proxy", &self.use_proxy)
            .field("timeout_secs", &self.timeout_secs)
            .field("retries", &self.retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Values that take precedence over the file; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub validate_certs: Option<bool>,
    pub use_proxy: Option<bool>,
    pub retries: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}

impl ConnectionConfig {
    pub fn overlay(mut self, overrides: ConnectionOverrides) -> Self {
        if overrides.url.is_some() {
            self.url = overrides.url;
        }
        if overrides.username.is_some() {
            self.username = overrides.username;
        }
        if overrides.password.is_some() {
            self.password = overrides.password;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if let Some(validate_certs) = overrides.validate_certs {
            self.validate_certs = validate_certs;
        }
        if let Some(use_proxy) = overrides.use_proxy {
            self.use_proxy = use_proxy;
        }
        if let Some(retries) = overrides.retries {
            self.retries = retries;
        }
        if let Some(delay) = overrides.retry_delay_secs {
            self.retry_delay_secs = delay;
        }
        self
    }

    pub fn check(&self) -> TaskResult<()> {
        self.validate()
            .map_err(|e| ConfigStoreError::ValidationFailed(e.to_string()).into())
    }

    pub fn base_url(&self) -> TaskResult<Url> {
        let raw = self.url.as_deref().ok_or_else(|| {
            TaskError::validation_error("url", "a server URL is required", None)
        })?;
        Url::parse(raw.trim_end_matches('/')).map_err(|e| {
            TaskError::validation_error("url", e.to_string(), Some(raw.to_string()))
        })
    }

    /// Token wins the mode; a token together with a password is rejected.
    pub fn credentials(&self) -> TaskResult<Credentials> {
        match (&self.token, &self.username, &self.password) {
            (Some(_), _, Some(_)) => Err(TaskError::validation_error(
                "token",
                "token and password are mutually exclusive",
                None,
            )),
            (Some(token), _, None) => Ok(Credentials::bearer(token.clone())),
            (None, Some(username), Some(password)) => {
                Ok(Credentials::basic(username.clone(), password.clone()))
            }
            (None, _, _) => Err(TaskError::validation_error(
                "credentials",
                "either a token or a username and password are required",
                None,
            )),
        }
    }

    pub fn transport_config(&self) -> TaskResult<TransportConfig> {
        self.check()?;
        Ok(TransportConfig {
            base_url: self.base_url()?,
            credentials: self.credentials()?,
            validate_certs: self.validate_certs,
            use_proxy: self.use_proxy,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

/// Configuration store for reading YAML configuration files
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Read any configuration type from YAML file
    pub fn read_config<T, P>(&self, config_path: P) -> Result<T, ConfigStoreError>
    where
        T: for<'de> Deserialize<'de>,
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();

        if !config_path.exists() {
            return Err(ConfigStoreError::ConfigFileNotFound(
                config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(config_path)
            .map_err(|e| ConfigStoreError::ReadFailed(e.to_string()))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigStoreError::YamlParsingFailed(e.to_string()))
    }

    /// File settings (if any) overlaid with `overrides`, validated.
    pub fn load_connection(
        &self,
        config_path: Option<&Path>,
        overrides: ConnectionOverrides,
    ) -> TaskResult<ConnectionConfig> {
        let base = match config_path {
            Some(path) => {
                debug!("Reading connection settings from {}", path.display());
                self.read_config::<ConnectionConfig, _>(path)?
            }
            None => ConnectionConfig::default(),
        };
        let config = base.overlay(overrides);
        config.check()?;
        Ok(config)
    }
}
