use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::request::{RawResponse, RequestSpec};
use super::transport::{Transport, TransportError};

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn parse(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// One logical response, after transport retries have collapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
    /// Body bytes as received
    pub raw: Vec<u8>,
    pub retries_used: u32,
}

impl ResponseEnvelope {
    pub fn from_raw(raw: RawResponse, retries_used: u32) -> Self {
        Self {
            status: raw.status,
            body: ResponseBody::parse(&raw.body),
            headers: raw.headers,
            raw: raw.body,
            retries_used,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON body, or `null` when there is none.
    pub fn into_json(self) -> Value {
        match self.body {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
            ResponseBody::Empty => Value::Null,
        }
    }

    /// First message of a Bitbucket error body (`{"errors": [{"message": ...}]}`), or the
    /// raw text.
    pub fn error_message(&self) -> Option<String> {
        match &self.body {
            ResponseBody::Json(value) => value
                .pointer("/errors/0/message")
                .and_then(Value::as_str)
                .map(str::to_string),
            ResponseBody::Text(text) => Some(text.trim().chars().take(200).collect()),
            ResponseBody::Empty => None,
        }
    }
}

/// Sends a request and returns its single logical outcome.
#[cfg_attr(test, mockall::automock)]
pub trait RequestExecutor {
    fn execute(&self, request: &RequestSpec) -> Result<ResponseEnvelope, TransportError>;
}

impl<T: RequestExecutor + ?Sized> RequestExecutor for std::sync::Arc<T> {
    fn execute(&self, request: &RequestSpec) -> Result<ResponseEnvelope, TransportError> {
        (**self).execute(request)
    }
}

/// Blocks the calling thread between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Bounded retry-with-delay around a [`Transport`].
///
/// Only connection-level failures are retried. Every HTTP status, 5xx included, is a final
/// answer for the caller to interpret.
pub struct RetryingExecutor {
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(transport: Box<dyn Transport>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, policy, Box::new(ThreadSleeper))
    }

    pub fn with_sleeper(
        transport: Box<dyn Transport>,
        policy: RetryPolicy,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl RequestExecutor for RetryingExecutor {
    fn execute(&self, request: &RequestSpec) -> Result<ResponseEnvelope, TransportError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.send(request) {
                Ok(raw) => {
                    debug!("{} -> {}", request, raw.status);
                    return Ok(ResponseEnvelope::from_raw(raw, attempt - 1));
                }
                Err(error) if error.is_retryable() && attempt < attempts => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}; retrying in {:?}",
                        attempt, attempts, request, error, self.policy.delay
                    );
                    self.sleeper.sleep(self.policy.delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
