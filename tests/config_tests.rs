//! Integration tests for configuration loading.
//!
//! These tests validate precedence env > yaml > defaults and the validation
//! errors raised for bad values.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;

use service_loadtest::config::{Config, ConfigError, LogFormat, ENV_VARS};
use service_loadtest::services::Service;
use service_loadtest::session::ThinkTime;
use service_loadtest::yaml_config::YamlConfig;

/// Clear all env vars that could affect config parsing.
/// Must be called at the start of every test to prevent leakage
/// from other tests (execution order is not guaranteed).
fn clean_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_service_is_error() {
    clean_env();

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingService), "{}", err);
}

#[test]
#[serial]
fn test_unknown_service_is_error() {
    clean_env();
    env::set_var("TARGET_SERVICE", "inventory");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::UnknownService(_)), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_defaults() {
    clean_env();
    env::set_var("TARGET_SERVICE", "payment");

    let config = Config::from_env().unwrap();

    assert_eq!(config.service, Service::Payment);
    assert_eq!(config.base_url, "http://localhost:8400");
    assert_eq!(config.num_concurrent_tasks, 10);
    assert_eq!(config.test_duration, Duration::from_secs(600));
    assert_eq!(config.think_time, ThinkTime::default());
    assert_eq!(config.request_timeout, None);
    assert_eq!(config.metrics_port, 9090);
    assert_eq!(config.log_format, LogFormat::Text);
    assert!(!config.skip_tls_verify);

    clean_env();
}

#[test]
#[serial]
fn test_target_host_gets_service_port() {
    clean_env();
    env::set_var("TARGET_SERVICE", "user-service");
    env::set_var("TARGET_HOST", "https://users.internal/");

    let config = Config::from_env().unwrap();
    assert_eq!(config.base_url, "https://users.internal:8700");

    clean_env();
}

#[test]
#[serial]
fn test_target_url_overrides_host() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("TARGET_HOST", "http://ignored");
    env::set_var("TARGET_URL", "http://gateway:8080/");

    let config = Config::from_env().unwrap();
    assert_eq!(config.base_url, "http://gateway:8080");

    clean_env();
}

#[test]
#[serial]
fn test_invalid_url_scheme() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("TARGET_URL", "ftp://orders");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl(_)), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_zero_users_rejected() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("NUM_CONCURRENT_TASKS", "0");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::NoVirtualUsers), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_invalid_number_and_duration() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("NUM_CONCURRENT_TASKS", "many");

    let err = Config::from_env().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { name: "NUM_CONCURRENT_TASKS", .. }),
        "{}",
        err
    );

    env::remove_var("NUM_CONCURRENT_TASKS");
    env::set_var("TEST_DURATION", "10 minutes");

    let err = Config::from_env().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { name: "TEST_DURATION", .. }),
        "{}",
        err
    );

    clean_env();
}

#[test]
#[serial]
fn test_unschedulable_durations_rejected() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("TEST_DURATION", "10000000000000000000s");

    let err = Config::from_env().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { name: "TEST_DURATION", .. }),
        "{}",
        err
    );

    env::remove_var("TEST_DURATION");
    env::set_var("THINK_TIME_MAX", "10000000000000000000s");

    let err = Config::from_env().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { name: "THINK_TIME_MAX", .. }),
        "{}",
        err
    );

    env::remove_var("THINK_TIME_MAX");
    env::set_var("REQUEST_TIMEOUT", "10000000000000000000s");

    let err = Config::from_env().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { name: "REQUEST_TIMEOUT", .. }),
        "{}",
        err
    );

    clean_env();
}

#[test]
#[serial]
fn test_unschedulable_yaml_duration_rejected() {
    clean_env();

    let yaml = r#"
target:
  service: order
duration: 10000000000000000000
"#;

    let yaml_config = YamlConfig::from_str(yaml).unwrap();
    let err = Config::from_yaml_with_env_overrides(&yaml_config).unwrap_err();

    assert!(
        matches!(err, ConfigError::InvalidValue { name: "TEST_DURATION", .. }),
        "{}",
        err
    );
}

#[test]
#[serial]
fn test_think_time_from_env() {
    clean_env();
    env::set_var("TARGET_SERVICE", "product");
    env::set_var("THINK_TIME_MIN", "200ms");
    env::set_var("THINK_TIME_MAX", "2s");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.think_time,
        ThinkTime::Random {
            min: Duration::from_millis(200),
            max: Duration::from_secs(2),
        }
    );

    env::set_var("THINK_TIME_MAX", "200ms");
    let config = Config::from_env().unwrap();
    assert_eq!(config.think_time, ThinkTime::Fixed(Duration::from_millis(200)));

    env::set_var("THINK_TIME_MIN", "5s");
    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::ThinkTimeRange { .. }), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_no_env_override_uses_yaml_values() {
    clean_env();
    let yaml = r#"
target:
  service: product
  host: http://catalog.internal
users: 25
duration: 15m
thinkTime:
  min: 500ms
  max: 1s
timeout: 30s
skipTlsVerify: true
metricsPort: 0
logFormat: json
"#;

    let yaml_config = YamlConfig::from_str(yaml).unwrap();
    let config = Config::from_yaml_with_env_overrides(&yaml_config).unwrap();

    assert_eq!(config.service, Service::Product);
    assert_eq!(config.base_url, "http://catalog.internal:8500");
    assert_eq!(config.num_concurrent_tasks, 25);
    assert_eq!(config.test_duration, Duration::from_secs(900));
    assert_eq!(
        config.think_time,
        ThinkTime::Random {
            min: Duration::from_millis(500),
            max: Duration::from_secs(1),
        }
    );
    assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    assert!(config.skip_tls_verify);
    assert_eq!(config.metrics_port, 0);
    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
#[serial]
fn test_env_overrides_yaml() {
    clean_env();
    let yaml = r#"
target:
  service: product
users: 25
duration: 15m
skipTlsVerify: true
"#;
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("NUM_CONCURRENT_TASKS", "5");
    env::set_var("TEST_DURATION", "30s");
    env::set_var("SKIP_TLS_VERIFY", "false");

    let yaml_config = YamlConfig::from_str(yaml).unwrap();
    let config = Config::from_yaml_with_env_overrides(&yaml_config).unwrap();

    assert_eq!(config.service, Service::Order);
    assert_eq!(config.base_url, "http://localhost:8300");
    assert_eq!(config.num_concurrent_tasks, 5);
    assert_eq!(config.test_duration, Duration::from_secs(30));
    assert!(!config.skip_tls_verify);

    clean_env();
}

#[test]
#[serial]
fn test_empty_env_value_falls_back_to_yaml() {
    clean_env();
    env::set_var("NUM_CONCURRENT_TASKS", "");

    let yaml_config = YamlConfig::from_str("target:\n  service: user\nusers: 4\n").unwrap();
    let config = Config::from_yaml_with_env_overrides(&yaml_config).unwrap();

    assert_eq!(config.num_concurrent_tasks, 4);

    clean_env();
}

#[test]
#[serial]
fn test_loadtest_config_file() {
    clean_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "target:\n  service: payment\n  url: http://payments.test:9000\nusers: 3\nduration: 45s"
    )
    .unwrap();

    env::set_var("LOADTEST_CONFIG", file.path());
    let config = Config::from_env().unwrap();

    assert_eq!(config.service, Service::Payment);
    assert_eq!(config.base_url, "http://payments.test:9000");
    assert_eq!(config.num_concurrent_tasks, 3);
    assert_eq!(config.test_duration, Duration::from_secs(45));

    clean_env();
}

#[test]
#[serial]
fn test_missing_config_file_is_error() {
    clean_env();
    env::set_var("LOADTEST_CONFIG", "/nonexistent/loadtest.yaml");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_client_config_carries_http_options() {
    clean_env();
    env::set_var("TARGET_SERVICE", "order");
    env::set_var("REQUEST_TIMEOUT", "5s");
    env::set_var("CUSTOM_HEADERS", "X-Load-Test:true");
    env::set_var("RESOLVE_TARGET_ADDR", "orders.internal:127.0.0.1:8300");

    let client_config = Config::from_env().unwrap().to_client_config();

    assert_eq!(client_config.request_timeout, Some(Duration::from_secs(5)));
    assert_eq!(client_config.custom_headers.as_deref(), Some("X-Load-Test:true"));
    assert_eq!(
        client_config.resolve_target_addr.as_deref(),
        Some("orders.internal:127.0.0.1:8300")
    );

    clean_env();
}
