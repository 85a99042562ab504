//! Task definitions: what one weighted request looks like and how its
//! response is judged.

use std::fmt;

use rand::RngCore;
use reqwest::Method;
use serde_json::Value;

use crate::errors::TaskFailure;

/// Builds a fresh request for a task from the virtual user's RNG.
pub type RequestBuilderFn = fn(&mut dyn RngCore) -> RequestTemplate;

/// A concrete request, ready to be sent against a base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub method: Method,

    /// Absolute path including the service prefix (e.g. "/api/order-service/orders/7")
    pub path: String,

    /// Query parameters, sent in order
    pub query: Vec<(&'static str, String)>,

    /// Optional JSON body
    pub body: Option<Value>,
}

impl RequestTemplate {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, name: &'static str, value: impl ToString) -> Self {
        self.query.push((name, value.to_string()));
        self
    }

    /// Path plus query string, as it appears on the wire.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Which failure message a rejected status produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    Standard,
    HealthCheck,
}

/// What to do with the response body once the status has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHandling {
    /// Drain and discard the body.
    Discard,

    /// Parse the body as JSON and cache `field` into the session as `variable`.
    /// A body that is not JSON fails the task.
    CaptureField {
        field: &'static str,
        variable: &'static str,
    },
}

/// One weighted entry in a service's task table.
#[derive(Clone)]
pub struct TaskDefinition {
    pub name: &'static str,

    /// Relative selection weight, always > 0
    pub weight: u32,

    /// Status codes counted as success
    pub success_codes: &'static [u16],

    pub status_check: StatusCheck,

    pub response: ResponseHandling,

    pub build: RequestBuilderFn,
}

impl TaskDefinition {
    /// A task that only judges the status code.
    pub fn new(
        name: &'static str,
        weight: u32,
        success_codes: &'static [u16],
        build: RequestBuilderFn,
    ) -> Self {
        Self {
            name,
            weight,
            success_codes,
            status_check: StatusCheck::Standard,
            response: ResponseHandling::Discard,
            build,
        }
    }

    pub fn health_check(mut self) -> Self {
        self.status_check = StatusCheck::HealthCheck;
        self
    }

    pub fn capture_field(mut self, field: &'static str, variable: &'static str) -> Self {
        self.response = ResponseHandling::CaptureField { field, variable };
        self
    }

    /// Sample a request for this task.
    pub fn build_request(&self, rng: &mut dyn RngCore) -> RequestTemplate {
        (self.build)(rng)
    }

    /// Judge a status code against the allow-list.
    pub fn classify_status(&self, status: u16) -> Result<(), TaskFailure> {
        if self.success_codes.contains(&status) {
            return Ok(());
        }
        Err(match self.status_check {
            StatusCheck::Standard => TaskFailure::UnexpectedStatus { status },
            StatusCheck::HealthCheck => TaskFailure::HealthCheckFailed { status },
        })
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("success_codes", &self.success_codes)
            .field("status_check", &self.status_check)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// The result of one task attempt.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: &'static str,

    /// Status code received, if the request got a response
    pub status_code: Option<u16>,

    /// Time spent waiting on the request in milliseconds
    pub response_time_ms: u64,

    pub result: Result<(), TaskFailure>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure reason for reporting, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }

    /// Prometheus label for the classification.
    pub fn result_label(&self) -> &'static str {
        if self.is_success() {
            "success"
        } else {
            "failure"
        }
    }
}
