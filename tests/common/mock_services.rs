//! Mock services for testing
//!
//! [`ScriptedTransport`] plays the server side of the wire: responses are routed by method
//! and path, and connection failures can be queued ahead of them to exercise retries.

use bbtask::infrastructure::http::request::{Method, RawResponse, RequestSpec};
use bbtask::infrastructure::http::transport::{Transport, TransportError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<RawResponse>,
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    failures: VecDeque<TransportError>,
    history: Vec<RequestSpec>,
}

/// Cloneable handle; every clone shares routes and call history.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON response; repeated registrations of a route are served in order and
    /// the last one keeps answering.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let response = if body.is_null() {
            RawResponse::new(status, Vec::new())
        } else {
            RawResponse::json(status, &body)
        };
        let mut state = self.state.lock().unwrap();
        match state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push_back(response),
            None => state.routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    /// The next send fails at the connection level before any route is consulted.
    pub fn fail_next(&self, error: TransportError) -> &Self {
        self.state.lock().unwrap().failures.push_back(error);
        self
    }

    pub fn history(&self) -> Vec<RequestSpec> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.history()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    pub fn mutations(&self) -> Vec<RequestSpec> {
        self.history()
            .into_iter()
            .filter(|r| r.method.is_mutating())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.history.push(request.clone());
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        let route = state
            .routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == request.url.path());
        Ok(match route {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front().unwrap(),
            Some(route) => route.responses.front().cloned().unwrap(),
            None => RawResponse::json(
                404,
                &json!({"errors": [{"message": format!("no route for {request}")}]}),
            ),
        })
    }
}
