//! Task execution engine.
//!
//! Sends one sampled request, classifies the response against the task's
//! allow-list and, for create tasks, captures the new resource id into the
//! session. Every path returns a [`TaskOutcome`]; nothing here is fatal.

use std::time::Instant;

use rand::RngCore;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::TaskFailure;
use crate::metrics::{record_outcome, CONCURRENT_REQUESTS};
use crate::services::Service;
use crate::session::Session;
use crate::task::{RequestTemplate, ResponseHandling, TaskDefinition, TaskOutcome};

/// Executor for running tasks against one base URL.
///
/// The client is shared across virtual users; all per-user state lives in the
/// [`Session`] passed to [`TaskExecutor::execute`].
///
/// # Example
/// ```rust,no_run
/// use service_loadtest::executor::TaskExecutor;
/// use service_loadtest::services::Service;
///
/// let executor = TaskExecutor::new(
///     Service::Order,
///     "http://localhost:8300".to_string(),
///     reqwest::Client::new(),
/// );
/// ```
#[derive(Clone)]
pub struct TaskExecutor {
    service: Service,

    /// Base URL for requests (e.g., "http://localhost:8300")
    base_url: String,

    client: reqwest::Client,
}

impl TaskExecutor {
    pub fn new(service: Service, base_url: String, client: reqwest::Client) -> Self {
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Sample a request for `task` and execute it.
    pub async fn execute<R: RngCore>(
        &self,
        task: &TaskDefinition,
        session: &mut Session,
        rng: &mut R,
    ) -> TaskOutcome {
        let request = task.build_request(rng);
        self.execute_request(task, request, session).await
    }

    /// Execute an already-built request for `task`.
    pub async fn execute_request(
        &self,
        task: &TaskDefinition,
        request: RequestTemplate,
        session: &mut Session,
    ) -> TaskOutcome {
        debug!(
            user = session.user_index(),
            task = task.name,
            method = %request.method,
            path = %request.path_and_query(),
            "Executing task"
        );

        let in_flight = InFlight::start();
        let start = Instant::now();
        let (status_code, result) = self.send(task, &request, session).await;
        let response_time_ms = start.elapsed().as_millis() as u64;
        drop(in_flight);

        session.record_iteration();

        let outcome = TaskOutcome {
            task: task.name,
            status_code,
            response_time_ms,
            result,
        };
        record_outcome(self.service.name(), &outcome);

        match &outcome.result {
            Ok(()) => debug!(
                user = session.user_index(),
                task = task.name,
                status_code = ?status_code,
                response_time_ms = response_time_ms,
                "Task succeeded"
            ),
            Err(failure) => warn!(
                user = session.user_index(),
                task = task.name,
                status_code = ?status_code,
                response_time_ms = response_time_ms,
                error_category = %failure.category(),
                error = %failure,
                "Task failed"
            ),
        }

        outcome
    }

    async fn send(
        &self,
        task: &TaskDefinition,
        request: &RequestTemplate,
        session: &mut Session,
    ) -> (Option<u16>, Result<(), TaskFailure>) {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return (None, Err(TaskFailure::transport(e))),
        };

        let status = response.status().as_u16();
        if let Err(failure) = task.classify_status(status) {
            drain(response).await;
            return (Some(status), Err(failure));
        }

        let result = match task.response {
            ResponseHandling::Discard => {
                drain(response).await;
                Ok(())
            }
            ResponseHandling::CaptureField { field, variable } => {
                capture_field(response, field, variable, session).await
            }
        };

        (Some(status), result)
    }
}

/// Holds one slot of the in-flight gauge, released on drop so a request
/// abandoned at the run deadline is not counted forever.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        CONCURRENT_REQUESTS.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        CONCURRENT_REQUESTS.dec();
    }
}

/// Reads and drops the body so the connection can go back to the pool.
async fn drain(mut response: reqwest::Response) {
    while let Ok(Some(_chunk)) = response.chunk().await {}
}

async fn capture_field(
    response: reqwest::Response,
    field: &str,
    variable: &str,
    session: &mut Session,
) -> Result<(), TaskFailure> {
    let bytes = response.bytes().await.map_err(TaskFailure::transport)?;
    // Anything but a JSON object fails, including arrays and scalars.
    let body: Map<String, Value> =
        serde_json::from_slice(&bytes).map_err(TaskFailure::ResponseParse)?;

    match body.get(field) {
        Some(Value::String(id)) => session.set_variable(variable, id.as_str()),
        Some(Value::Null) | None => session.clear_variable(variable),
        Some(other) => session.set_variable(variable, other.to_string()),
    }

    if let Some(id) = session.get_variable(variable) {
        debug!(user = session.user_index(), variable = variable, id = id, "Captured id");
    }

    Ok(())
}
