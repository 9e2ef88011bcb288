//! Route-scripted executor for unit tests.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::executor::{RequestExecutor, ResponseEnvelope};
use super::request::{Method, RawResponse, RequestSpec};
use super::transport::TransportError;

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<RawResponse>,
}

/// Answers requests by method and URL path; queued responses are consumed in order and
/// the last one repeats.
#[derive(Default)]
pub struct ScriptedExecutor {
    routes: Mutex<Vec<Route>>,
    history: Mutex<Vec<RequestSpec>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        let response = if body.is_null() {
            RawResponse::new(status, Vec::new())
        } else {
            RawResponse::json(status, &body)
        };
        self.on_raw(method, path, response)
    }

    pub fn on_raw(self, method: Method, path: &str, response: RawResponse) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes
                .iter_mut()
                .find(|r| r.method == method && r.path == path)
            {
                Some(route) => route.responses.push_back(response),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Single page listing response.
    pub fn page(values: Value) -> Value {
        json!({ "values": values, "isLastPage": true, "start": 0, "size": 0 })
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        self.history.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<RequestSpec> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.is_mutating())
            .collect()
    }
}

impl RequestExecutor for ScriptedExecutor {
    fn execute(&self, request: &RequestSpec) -> Result<ResponseEnvelope, TransportError> {
        self.history.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == request.url.path());
        let raw = match route {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front().unwrap(),
            Some(route) => route.responses.front().cloned().unwrap(),
            None => RawResponse::json(
                404,
                &json!({"errors": [{"message": format!("no route for {request}")}]}),
            ),
        };
        Ok(ResponseEnvelope::from_raw(raw, 0))
    }
}
