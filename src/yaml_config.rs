//! YAML configuration file support.
//!
//! A YAML file is an alternative to a wall of environment variables: it can
//! be checked in next to the deployment it targets. Values found in the
//! environment still win, see [`crate::config::Config::from_yaml_with_env_overrides`].
//!
//! ```yaml
//! target:
//!   service: payment
//!   host: http://payments.internal
//! users: 25
//! duration: 15m
//! thinkTime:
//!   min: 1s
//!   max: 3s
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::session::ThinkTime;

/// Errors that can occur when loading or parsing YAML configuration.
#[derive(Error, Debug)]
pub enum YamlConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid duration '{value}': {reason}")]
    Duration { value: String, reason: String },
}

/// Duration format for YAML: either bare seconds or a string like "30s".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum YamlDuration {
    Seconds(u64),
    String(String),
}

impl YamlDuration {
    pub fn to_std_duration(&self) -> Result<Duration, YamlConfigError> {
        match self {
            YamlDuration::Seconds(s) => Ok(Duration::from_secs(*s)),
            YamlDuration::String(s) => {
                crate::utils::parse_duration_string(s).map_err(|reason| YamlConfigError::Duration {
                    value: s.clone(),
                    reason,
                })
            }
        }
    }
}

/// Which service to drive and where it lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlTarget {
    pub service: Option<String>,

    /// Scheme and host; the service's port is appended
    pub host: Option<String>,

    /// Full base URL, overrides `host`
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlThinkTime {
    pub min: YamlDuration,
    pub max: YamlDuration,
}

impl YamlThinkTime {
    pub fn to_think_time(&self) -> Result<ThinkTime, YamlConfigError> {
        Ok(ThinkTime::Random {
            min: self.min.to_std_duration()?,
            max: self.max.to_std_duration()?,
        })
    }
}

/// Root of a YAML config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct YamlConfig {
    #[serde(default)]
    pub target: YamlTarget,

    /// Number of virtual users
    pub users: Option<usize>,

    pub duration: Option<YamlDuration>,

    pub think_time: Option<YamlThinkTime>,

    /// Per-request timeout
    pub timeout: Option<YamlDuration>,

    pub skip_tls_verify: Option<bool>,

    pub custom_headers: Option<String>,

    pub resolve_target_addr: Option<String>,

    pub client_cert_path: Option<String>,

    pub client_key_path: Option<String>,

    pub metrics_port: Option<u16>,

    pub log_format: Option<String>,
}

impl YamlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, YamlConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, YamlConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
