//! Failure classification for task outcomes.
//!
//! Every task attempt ends in either success or a [`TaskFailure`]. Failures are
//! reported, never propagated: the virtual-user loop carries on regardless.
//! Transport failures are further bucketed into an [`ErrorCategory`] so the
//! metrics can tell a refused connection apart from a timeout.

use std::fmt;

use thiserror::Error;

/// Categories of errors that can occur during load testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP 4xx errors (client errors)
    ClientError,

    /// HTTP 5xx errors (server errors)
    ServerError,

    /// Network connectivity errors (DNS, connection refused, etc.)
    NetworkError,

    /// Request timeout errors
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// Response body could not be decoded
    ParseError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code that fell outside a task's allow-list.
    pub fn from_status_code(status_code: u16) -> Self {
        match status_code {
            400..=499 => ErrorCategory::ClientError,
            500..=599 => ErrorCategory::ServerError,
            _ => ErrorCategory::OtherError,
        }
    }

    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ErrorCategory::TimeoutError
        } else if error.is_connect() || error.is_request() || error.is_body() {
            ErrorCategory::NetworkError
        } else if error.is_decode() {
            ErrorCategory::ParseError
        } else if error.is_redirect() {
            ErrorCategory::ClientError
        } else {
            let error_msg = error.to_string().to_lowercase();

            if error_msg.contains("certificate")
                || error_msg.contains("tls")
                || error_msg.contains("ssl")
            {
                ErrorCategory::TlsError
            } else if error_msg.contains("timeout") {
                ErrorCategory::TimeoutError
            } else if error_msg.contains("dns") || error_msg.contains("connect") {
                ErrorCategory::NetworkError
            } else {
                ErrorCategory::OtherError
            }
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::ParseError => "parse_error",
            ErrorCategory::OtherError => "other_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a single task attempt was classified as a failure.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("Failed with status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Health check failed: {status}")]
    HealthCheckFailed { status: u16 },

    #[error("Failed to parse response")]
    ResponseParse(#[source] serde_json::Error),

    #[error("Request failed ({category}): {source}")]
    Transport {
        category: ErrorCategory,
        #[source]
        source: reqwest::Error,
    },
}

impl TaskFailure {
    /// Wraps a reqwest error, categorizing it on the way.
    pub fn transport(source: reqwest::Error) -> Self {
        TaskFailure::Transport {
            category: ErrorCategory::from_reqwest_error(&source),
            source,
        }
    }

    /// The category this failure is counted under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TaskFailure::UnexpectedStatus { status } | TaskFailure::HealthCheckFailed { status } => {
                ErrorCategory::from_status_code(*status)
            }
            TaskFailure::ResponseParse(_) => ErrorCategory::ParseError,
            TaskFailure::Transport { category, .. } => *category,
        }
    }

    /// The rejected status code, for failures caused by the allow-list.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TaskFailure::UnexpectedStatus { status } | TaskFailure::HealthCheckFailed { status } => {
                Some(*status)
            }
            TaskFailure::ResponseParse(_) | TaskFailure::Transport { .. } => None,
        }
    }
}
