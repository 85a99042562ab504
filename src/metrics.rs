use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::env;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::task::TaskOutcome;

lazy_static::lazy_static! {
    pub static ref METRIC_NAMESPACE: String =
        env::var("METRIC_NAMESPACE").unwrap_or_else(|_| "service_loadtest".to_string());

    // === Task Metrics ===

    pub static ref TASK_EXECUTIONS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("task_executions_total", "Total number of task executions by outcome")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["service", "task", "result"]  // result: success, failure
        ).unwrap();

    pub static ref TASK_FAILURES_BY_CATEGORY: IntCounterVec =
        IntCounterVec::new(
            Opts::new("task_failures_by_category_total", "Number of failed tasks by error category")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["service", "category"]
        ).unwrap();

    // === Request Metrics ===

    pub static ref REQUEST_STATUS_CODES: IntCounterVec =
        IntCounterVec::new(
            Opts::new("requests_status_codes_total", "Number of HTTP requests by status code")
                .namespace(METRIC_NAMESPACE.as_str()),
            &["service", "status_code"]
        ).unwrap();

    pub static ref REQUEST_DURATION_SECONDS: HistogramVec =
        HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "HTTP request latencies in seconds, excluding think time"
            ).namespace(METRIC_NAMESPACE.as_str()),
            &["service", "task"]
        ).unwrap();

    pub static ref CONCURRENT_REQUESTS: Gauge =
        Gauge::with_opts(
            Opts::new("concurrent_requests", "Number of HTTP requests currently in flight")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();

    // === Virtual User Metrics ===

    pub static ref ACTIVE_VIRTUAL_USERS: IntGauge =
        IntGauge::with_opts(
            Opts::new("active_virtual_users", "Number of virtual users currently running")
                .namespace(METRIC_NAMESPACE.as_str())
        ).unwrap();
}

/// Registers all metrics with the default Prometheus registry.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let registry = prometheus::default_registry();

    registry.register(Box::new(TASK_EXECUTIONS_TOTAL.clone()))?;
    registry.register(Box::new(TASK_FAILURES_BY_CATEGORY.clone()))?;
    registry.register(Box::new(REQUEST_STATUS_CODES.clone()))?;
    registry.register(Box::new(REQUEST_DURATION_SECONDS.clone()))?;
    registry.register(Box::new(CONCURRENT_REQUESTS.clone()))?;
    registry.register(Box::new(ACTIVE_VIRTUAL_USERS.clone()))?;

    Ok(())
}

/// Records a finished task attempt under the given service label.
pub fn record_outcome(service: &str, outcome: &TaskOutcome) {
    TASK_EXECUTIONS_TOTAL
        .with_label_values(&[service, outcome.task, outcome.result_label()])
        .inc();

    match outcome.status_code {
        Some(code) => REQUEST_STATUS_CODES
            .with_label_values(&[service, status_code_label(code)])
            .inc(),
        None => REQUEST_STATUS_CODES
            .with_label_values(&[service, "error"])
            .inc(),
    }

    REQUEST_DURATION_SECONDS
        .with_label_values(&[service, outcome.task])
        .observe(outcome.response_time_ms as f64 / 1000.0);

    if let Err(failure) = &outcome.result {
        TASK_FAILURES_BY_CATEGORY
            .with_label_values(&[service, failure.category().label()])
            .inc();
    }
}

/// Returns a static string label for the status codes these services produce.
///
/// Uncommon codes fall back to "other" to keep label cardinality bounded.
pub fn status_code_label(code: u16) -> &'static str {
    match code {
        200 => "200",
        201 => "201",
        204 => "204",
        301 => "301",
        302 => "302",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        405 => "405",
        409 => "409",
        415 => "415",
        429 => "429",
        500 => "500",
        502 => "502",
        503 => "503",
        504 => "504",
        _ => "other",
    }
}

fn encode(registry: &Mutex<Registry>) -> Result<Vec<u8>, prometheus::Error> {
    let metric_families = match registry.lock() {
        Ok(guard) => guard.gather(),
        Err(poisoned) => poisoned.into_inner().gather(),
    };
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

/// HTTP handler for the Prometheus metrics endpoint.
pub async fn metrics_handler(
    req: Request<Body>,
    registry: Arc<Mutex<Registry>>,
) -> Result<Response<Body>, hyper::Error> {
    let mut response = Response::new(Body::empty());

    if req.method() != Method::GET || req.uri().path() != "/metrics" {
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    }

    match encode(&registry) {
        Ok(buffer) => {
            if let Ok(content_type) = TextEncoder::new().format_type().parse() {
                response
                    .headers_mut()
                    .insert(hyper::header::CONTENT_TYPE, content_type);
            }
            *response.body_mut() = Body::from(buffer);
        }
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    Ok(response)
}

/// Starts the Prometheus metrics HTTP server.
pub async fn start_metrics_server(port: u16, registry: Arc<Mutex<Registry>>) {
    let addr = ([0, 0, 0, 0], port).into();

    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                metrics_handler(req, registry.clone())
            }))
        }
    });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    info!(port = port, addr = %addr, "Metrics server listening");

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server error");
    }
}

/// Gathers and encodes metrics as a string for final output.
pub fn gather_metrics_string(registry: &Arc<Mutex<Registry>>) -> String {
    match encode(registry) {
        Ok(buffer) => String::from_utf8(buffer).unwrap_or_else(|e| {
            error!(error = %e, "Error encoding metrics to UTF-8");
            String::from("# ERROR ENCODING METRICS TO UTF-8")
        }),
        Err(e) => {
            error!(error = %e, "Error gathering metrics");
            String::from("# ERROR GATHERING METRICS")
        }
    }
}
