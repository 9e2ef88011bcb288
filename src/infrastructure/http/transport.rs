use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::request::{FormPart, Method, RawResponse, RequestBody, RequestSpec};
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::value_objects::credentials::Credentials;

/// Failure to obtain any HTTP response at all.
///
/// HTTP error statuses are never transport errors; they come back as a normal
/// [`RawResponse`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },
}

impl TransportError {
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn timeout(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Connection-level failures (refused, DNS, TLS handshake, timeout) may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest { .. })
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        let message = error.to_string();
        if error.is_builder() {
            Self::InvalidRequest { url, message }
        } else if error.is_timeout() {
            Self::Timeout { url, message }
        } else {
            Self::Connect { url, message }
        }
    }
}

/// Issues exactly one HTTP request.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError>;
}

/// Connection settings handed to the transport at construction.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub validate_certs: bool,
    pub use_proxy: bool,
    pub timeout: Duration,
}

/// Blocking `reqwest` transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> TaskResult<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.validate_certs)
            .cookie_store(true)
            .user_agent(concat!("bbtask/", env!("CARGO_PKG_VERSION")));
        if !config.use_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| TaskError::config_error_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
        })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

fn multipart_form(parts: &[FormPart]) -> Form {
    parts.iter().fold(Form::new(), |form, part| {
        let body = Part::bytes(part.bytes.clone());
        let body = match &part.file_name {
            Some(file_name) => body.file_name(file_name.clone()),
            None => body,
        };
        form.part(part.name.clone(), body)
    })
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.clone())
            .header(ACCEPT, "application/json");

        builder = match &self.credentials {
            Credentials::BasicAuth { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            bearer => match bearer.bearer_header() {
                Some(value) => builder.header(AUTHORIZATION, value),
                None => builder,
            },
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            // `json` sets `Content-Type: application/json`
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Multipart(parts)) => builder.multipart(multipart_form(parts)),
            None => builder,
        };

        debug!("{} {}", request.method, request.url);
        let response = builder
            .send()
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::connect("https://x", "refused").is_retryable());
        assert!(TransportError::timeout("https://x", "30s").is_retryable());
        let invalid = TransportError::InvalidRequest {
            url: "https://x".into(),
            message: "bad header".into(),
        };
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn test_client_builds_with_insecure_and_no_proxy() {
        let config = TransportConfig {
            base_url: Url::parse("https://bitbucket.example.com").unwrap(),
            credentials: Credentials::bearer("token"),
            validate_certs: false,
            use_proxy: false,
            timeout: Duration::from_secs(5),
        };
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
