use std::env;
use std::str::FromStr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::client::ClientConfig;
use crate::selector::TaskSelector;
use crate::services::{Service, UnknownService};
use crate::session::ThinkTime;
use crate::utils::parse_duration_string;
use crate::yaml_config::{YamlConfig, YamlConfigError};

const DEFAULT_HOST: &str = "http://localhost";
const DEFAULT_USERS: usize = 10;
const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(10 * 60);
const DEFAULT_METRICS_PORT: u16 = 9090;

/// Every environment variable the configuration reads.
pub const ENV_VARS: [&str; 16] = [
    "LOADTEST_CONFIG",
    "TARGET_SERVICE",
    "TARGET_HOST",
    "TARGET_URL",
    "NUM_CONCURRENT_TASKS",
    "TEST_DURATION",
    "THINK_TIME_MIN",
    "THINK_TIME_MAX",
    "REQUEST_TIMEOUT",
    "METRICS_PORT",
    "LOG_FORMAT",
    "SKIP_TLS_VERIFY",
    "RESOLVE_TARGET_ADDR",
    "CLIENT_CERT_PATH",
    "CLIENT_KEY_PATH",
    "CUSTOM_HEADERS",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TARGET_SERVICE must be set (order, payment, product or user)")]
    MissingService,

    #[error(transparent)]
    UnknownService(#[from] UnknownService),

    #[error("Invalid {name} value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Base URL '{0}' must start with http:// or https://")]
    InvalidUrl(String),

    #[error("NUM_CONCURRENT_TASKS must be greater than 0")]
    NoVirtualUsers,

    #[error("THINK_TIME_MIN ({min:?}) must not exceed THINK_TIME_MAX ({max:?})")]
    ThinkTimeRange { min: Duration, max: Duration },

    #[error(transparent)]
    Yaml(#[from] YamlConfigError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

/// Main configuration for the load test.
#[derive(Debug, Clone)]
pub struct Config {
    pub service: Service,
    pub base_url: String,
    pub num_concurrent_tasks: usize,
    pub test_duration: Duration,
    pub think_time: ThinkTime,
    pub request_timeout: Option<Duration>,
    pub metrics_port: u16,
    pub log_format: LogFormat,
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub custom_headers: Option<String>,
}

/// Reads a variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    env_var(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_duration_env(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    env_var(name)
        .map(|value| {
            parse_duration_string(&value).map_err(|reason| ConfigError::InvalidValue {
                name,
                value,
                reason,
            })
        })
        .transpose()
}

/// Rejects durations that cannot be added to the current instant.
fn ensure_schedulable(name: &'static str, duration: Duration) -> Result<Duration, ConfigError> {
    match Instant::now().checked_add(duration) {
        Some(_) => Ok(duration),
        None => Err(ConfigError::InvalidValue {
            name,
            value: format!("{:?}", duration),
            reason: "duration is too large to schedule".to_string(),
        }),
    }
}

impl Config {
    /// Loads configuration from environment variables, layered over the YAML
    /// file named by `LOADTEST_CONFIG` when it is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env_var("LOADTEST_CONFIG") {
            Some(path) => {
                info!(path = %path, "Loading YAML configuration");
                let yaml = YamlConfig::from_file(&path)?;
                Self::from_yaml_with_env_overrides(&yaml)
            }
            None => Self::from_yaml_with_env_overrides(&YamlConfig::default()),
        }
    }

    /// Builds the configuration with precedence env > YAML > defaults.
    pub fn from_yaml_with_env_overrides(yaml: &YamlConfig) -> Result<Self, ConfigError> {
        let service: Service = match env_var("TARGET_SERVICE").or_else(|| yaml.target.service.clone()) {
            Some(name) => name.parse::<Service>()?,
            None => return Err(ConfigError::MissingService),
        };

        let base_url = match env_var("TARGET_URL").or_else(|| yaml.target.url.clone()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = env_var("TARGET_HOST")
                    .or_else(|| yaml.target.host.clone())
                    .unwrap_or_else(|| DEFAULT_HOST.to_string());
                service.base_url(&host)
            }
        };
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(base_url));
        }

        let num_concurrent_tasks = parse_env::<usize>("NUM_CONCURRENT_TASKS")?
            .or(yaml.users)
            .unwrap_or(DEFAULT_USERS);
        if num_concurrent_tasks == 0 {
            return Err(ConfigError::NoVirtualUsers);
        }

        let test_duration = match parse_duration_env("TEST_DURATION")? {
            Some(d) => d,
            None => match &yaml.duration {
                Some(d) => d.to_std_duration()?,
                None => DEFAULT_TEST_DURATION,
            },
        };
        let test_duration = ensure_schedulable("TEST_DURATION", test_duration)?;

        let think_time = Self::resolve_think_time(yaml)?;

        let request_timeout = match parse_duration_env("REQUEST_TIMEOUT")? {
            Some(d) => Some(d),
            None => yaml
                .timeout
                .as_ref()
                .map(|d| d.to_std_duration())
                .transpose()?,
        };
        let request_timeout = request_timeout
            .map(|d| ensure_schedulable("REQUEST_TIMEOUT", d))
            .transpose()?;

        let metrics_port = parse_env::<u16>("METRICS_PORT")?
            .or(yaml.metrics_port)
            .unwrap_or(DEFAULT_METRICS_PORT);

        let log_format = match env_var("LOG_FORMAT").or_else(|| yaml.log_format.clone()) {
            Some(value) => value.parse::<LogFormat>().map_err(|reason| ConfigError::InvalidValue {
                name: "LOG_FORMAT",
                value,
                reason,
            })?,
            None => LogFormat::default(),
        };

        let skip_tls_verify = match env_var("SKIP_TLS_VERIFY") {
            Some(value) => parse_bool("SKIP_TLS_VERIFY", &value)?,
            None => yaml.skip_tls_verify.unwrap_or(false),
        };

        Ok(Config {
            service,
            base_url,
            num_concurrent_tasks,
            test_duration,
            think_time,
            request_timeout,
            metrics_port,
            log_format,
            skip_tls_verify,
            resolve_target_addr: env_var("RESOLVE_TARGET_ADDR")
                .or_else(|| yaml.resolve_target_addr.clone()),
            client_cert_path: env_var("CLIENT_CERT_PATH").or_else(|| yaml.client_cert_path.clone()),
            client_key_path: env_var("CLIENT_KEY_PATH").or_else(|| yaml.client_key_path.clone()),
            custom_headers: env_var("CUSTOM_HEADERS").or_else(|| yaml.custom_headers.clone()),
        })
    }

    fn resolve_think_time(yaml: &YamlConfig) -> Result<ThinkTime, ConfigError> {
        let yaml_think_time = match &yaml.think_time {
            Some(t) => t.to_think_time()?,
            None => ThinkTime::default(),
        };
        let (default_min, default_max) = match yaml_think_time {
            ThinkTime::Random { min, max } => (min, max),
            ThinkTime::Fixed(d) => (d, d),
        };

        let min = parse_duration_env("THINK_TIME_MIN")?.unwrap_or(default_min);
        let max = parse_duration_env("THINK_TIME_MAX")?.unwrap_or(default_max);
        let max = ensure_schedulable("THINK_TIME_MAX", max)?;

        if min > max {
            return Err(ConfigError::ThinkTimeRange { min, max });
        }
        if min == max {
            return Ok(ThinkTime::Fixed(min));
        }
        Ok(ThinkTime::Random { min, max })
    }

    /// Creates a ClientConfig from this Config.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            skip_tls_verify: self.skip_tls_verify,
            resolve_target_addr: self.resolve_target_addr.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_key_path: self.client_key_path.clone(),
            custom_headers: self.custom_headers.clone(),
            request_timeout: self.request_timeout,
        }
    }

    /// Prints the configuration summary.
    pub fn print_summary(&self, parsed_headers: &reqwest::header::HeaderMap) {
        println!("Starting load test:");
        println!("  Service: {}", self.service);
        println!("  Base URL: {}", self.base_url);
        println!("  Virtual Users: {}", self.num_concurrent_tasks);
        println!("  Test Duration: {:?}", self.test_duration);
        println!("  Think Time: {:?}", self.think_time);
        println!("  Task Mix:");
        for (task, probability) in TaskSelector::new(self.service.tasks()).probabilities() {
            println!("    {:<20} {:>5.1}%", task, probability * 100.0);
        }
        match self.request_timeout {
            Some(timeout) => println!("  Request Timeout: {:?}", timeout),
            None => println!("  Request Timeout: none"),
        }
        println!("  Skip TLS Verify: {}", self.skip_tls_verify);
        println!(
            "  mTLS Enabled: {}",
            if self.client_cert_path.is_some() && self.client_key_path.is_some() {
                "Yes"
            } else {
                "No"
            }
        );
        if parsed_headers.is_empty() {
            println!("  Custom Headers: none");
        } else {
            println!("  Custom Headers:");
            for (name, value) in parsed_headers {
                println!(
                    "    {}: {}",
                    name,
                    value.to_str().unwrap_or("<non-ASCII or sensitive value>")
                );
            }
        }
        if self.metrics_port == 0 {
            println!("  Metrics Server: disabled");
        } else {
            println!("  Metrics Server: 0.0.0.0:{}/metrics", self.metrics_port);
        }
    }
}
