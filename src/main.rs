use std::sync::{Arc, Mutex};
use tokio::time;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use service_loadtest::client::build_client;
use service_loadtest::config::{Config, LogFormat};
use service_loadtest::metrics::{gather_metrics_string, register_metrics, start_metrics_server};
use service_loadtest::worker::{run_virtual_user, VirtualUserConfig};

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Required environment variables:");
    eprintln!("  TARGET_SERVICE          - Service to drive: order, payment, product or user");
    eprintln!();
    eprintln!("Optional environment variables:");
    eprintln!("  TARGET_HOST             - Scheme and host, the service port is appended (default: http://localhost)");
    eprintln!("  TARGET_URL              - Full base URL, overrides TARGET_HOST (must start with http:// or https://)");
    eprintln!("  NUM_CONCURRENT_TASKS    - Number of virtual users (default: 10, must be > 0)");
    eprintln!("  TEST_DURATION           - Total test duration: 30s, 10m, 2h, 1d (default: 10m)");
    eprintln!("  THINK_TIME_MIN          - Minimum pause between tasks (default: 1s)");
    eprintln!("  THINK_TIME_MAX          - Maximum pause between tasks (default: 3s)");
    eprintln!("  REQUEST_TIMEOUT         - Per-request timeout (default: none)");
    eprintln!("  LOADTEST_CONFIG         - Path to a YAML config file, environment values win");
    eprintln!();
    eprintln!("TLS/mTLS configuration:");
    eprintln!("  SKIP_TLS_VERIFY         - Skip TLS certificate verification (default: false)");
    eprintln!("  CLIENT_CERT_PATH        - Path to client certificate for mTLS");
    eprintln!("  CLIENT_KEY_PATH         - Path to client key for mTLS");
    eprintln!("  Note: Both CLIENT_CERT_PATH and CLIENT_KEY_PATH must be set together");
    eprintln!();
    eprintln!("Advanced configuration:");
    eprintln!("  RESOLVE_TARGET_ADDR     - DNS override: hostname:ip:port");
    eprintln!("  CUSTOM_HEADERS          - Comma-separated headers (use \\, for literal commas)");
    eprintln!("  METRICS_PORT            - Prometheus endpoint port, 0 disables (default: 9090)");
    eprintln!("  METRIC_NAMESPACE        - Prometheus metric namespace (default: service_loadtest)");
    eprintln!("  LOG_FORMAT              - text or json (default: text)");
    eprintln!("  RUST_LOG                - Log filter (default: info)");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration from environment variables
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);

    // Register Prometheus metrics
    register_metrics()?;

    // Build HTTP client with TLS and header configuration
    let client_result = build_client(&config.to_client_config())?;
    let client = client_result.client;

    // Print configuration summary
    config.print_summary(&client_result.parsed_headers);

    let registry_arc = Arc::new(Mutex::new(prometheus::default_registry().clone()));

    if config.metrics_port != 0 {
        let registry = registry_arc.clone();
        let metrics_port = config.metrics_port;
        tokio::spawn(async move {
            start_metrics_server(metrics_port, registry).await;
        });
    }

    let start_time = time::Instant::now();

    let mut handles = Vec::with_capacity(config.num_concurrent_tasks);
    for i in 0..config.num_concurrent_tasks {
        let user_config = VirtualUserConfig {
            user_index: i,
            service: config.service,
            base_url: config.base_url.clone(),
            think_time: config.think_time.clone(),
            test_duration: config.test_duration,
            rng_seed: None,
        };

        let client_clone = client.clone();
        handles.push(tokio::spawn(async move {
            run_virtual_user(client_clone, user_config, start_time).await
        }));
    }

    let mut iterations = 0u64;
    for handle in handles {
        match handle.await {
            Ok(session) => iterations += session.iterations(),
            Err(e) => error!(error = %e, "Virtual user task panicked"),
        }
    }

    info!(
        service = %config.service,
        users = config.num_concurrent_tasks,
        iterations = iterations,
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Test duration completed"
    );

    // Gather and print final metrics
    let final_metrics_output = gather_metrics_string(&registry_arc);
    println!("\n--- FINAL METRICS ---\n{}", final_metrics_output);
    println!("--- END OF FINAL METRICS ---\n");

    Ok(())
}
