use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::utils::parse_headers_with_escapes;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("RESOLVE_TARGET_ADDR ('{0}') is not in the expected format 'hostname:ip:port'")]
    ResolveFormat(String),

    #[error("RESOLVE_TARGET_ADDR: invalid address '{addr}': {reason}")]
    ResolveAddress { addr: String, reason: String },

    #[error("{0}")]
    Mtls(String),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid header in CUSTOM_HEADERS: {0}")]
    Header(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Configuration for building the HTTP client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub custom_headers: Option<String>,
    pub request_timeout: Option<Duration>,
}

/// Result of building the client, includes parsed headers for logging.
pub struct ClientBuildResult {
    pub client: reqwest::Client,
    pub parsed_headers: HeaderMap,
}

/// Builds the reqwest client shared by every virtual user.
///
/// One client means one connection pool; virtual users hold no cookies or
/// other per-session transport state, so sharing is safe.
pub fn build_client(config: &ClientConfig) -> Result<ClientBuildResult, ClientError> {
    let mut client_builder = reqwest::Client::builder();

    if let Some(resolve_str) = config.resolve_target_addr.as_deref() {
        if resolve_str.is_empty() {
            warn!("RESOLVE_TARGET_ADDR is set but empty, no DNS override will be applied");
        } else {
            client_builder = configure_dns_override(client_builder, resolve_str)?;
        }
    }

    client_builder = configure_mtls(
        client_builder,
        config.client_cert_path.as_deref(),
        config.client_key_path.as_deref(),
    )?;

    let parsed_headers = configure_custom_headers(config.custom_headers.as_deref())?;
    if !parsed_headers.is_empty() {
        client_builder = client_builder.default_headers(parsed_headers.clone());
        info!(count = parsed_headers.len(), "Configured custom default headers");
    }

    if let Some(timeout) = config.request_timeout {
        client_builder = client_builder.timeout(timeout);
    }

    if config.skip_tls_verify {
        warn!("Skipping TLS certificate verification");
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    Ok(ClientBuildResult {
        client: client_builder.build()?,
        parsed_headers,
    })
}

fn configure_dns_override(
    client_builder: reqwest::ClientBuilder,
    resolve_str: &str,
) -> Result<reqwest::ClientBuilder, ClientError> {
    let parts: Vec<&str> = resolve_str.split(':').map(str::trim).collect();
    let [hostname, ip, port] = parts[..] else {
        return Err(ClientError::ResolveFormat(resolve_str.to_string()));
    };

    if hostname.is_empty() || ip.is_empty() || port.is_empty() {
        return Err(ClientError::ResolveFormat(resolve_str.to_string()));
    }

    let socket_addr_str = format!("{}:{}", ip, port);
    let socket_addr: SocketAddr =
        socket_addr_str
            .parse()
            .map_err(|e: std::net::AddrParseError| ClientError::ResolveAddress {
                addr: socket_addr_str.clone(),
                reason: e.to_string(),
            })?;

    info!(hostname = hostname, addr = %socket_addr, "Configured DNS override");
    Ok(client_builder.resolve(hostname, socket_addr))
}

fn read_pem(path: &str) -> Result<Vec<u8>, ClientError> {
    fs::read(path).map_err(|source| ClientError::ReadFile {
        path: path.to_string(),
        source,
    })
}

fn configure_mtls(
    client_builder: reqwest::ClientBuilder,
    cert_path: Option<&str>,
    key_path: Option<&str>,
) -> Result<reqwest::ClientBuilder, ClientError> {
    let (cert_path, key_path) = match (cert_path, key_path) {
        (Some(cert), Some(key)) => (cert, key),
        (Some(_), None) => {
            return Err(ClientError::Mtls(
                "CLIENT_CERT_PATH is set, but CLIENT_KEY_PATH is missing for mTLS.".into(),
            ))
        }
        (None, Some(_)) => {
            return Err(ClientError::Mtls(
                "CLIENT_KEY_PATH is set, but CLIENT_CERT_PATH is missing for mTLS.".into(),
            ))
        }
        (None, None) => return Ok(client_builder),
    };

    let cert_pem = read_pem(cert_path)?;
    let key_pem = read_pem(key_path)?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_pem.as_slice()).collect();
    if certs.is_empty() {
        return Err(ClientError::Mtls(format!(
            "No PEM certificates found in '{}'",
            cert_path
        )));
    }
    if let Some(Err(e)) = certs.into_iter().find(Result::is_err) {
        return Err(ClientError::Mtls(format!(
            "Failed to parse PEM certificates from '{}': {}",
            cert_path, e
        )));
    }

    // reqwest's rustls identity expects a PKCS#8 key
    let keys: Vec<_> = rustls_pemfile::pkcs8_private_keys(&mut key_pem.as_slice()).collect();
    if keys.is_empty() {
        return Err(ClientError::Mtls(format!(
            "No PKCS#8 private keys found in '{}'",
            key_path
        )));
    }
    if let Some(Err(e)) = keys.into_iter().find(Result::is_err) {
        return Err(ClientError::Mtls(format!(
            "Failed to parse private key from '{}' as PKCS#8: {}",
            key_path, e
        )));
    }

    let mut combined = cert_pem;
    if !combined.ends_with(b"\n") && !key_pem.starts_with(b"\n") {
        combined.push(b'\n');
    }
    combined.extend_from_slice(&key_pem);

    let identity = reqwest::Identity::from_pem(&combined)
        .map_err(|e| ClientError::Mtls(format!("Failed to create identity from PEM: {}", e)))?;

    info!(cert = cert_path, key = key_path, "Configured mTLS client identity");
    Ok(client_builder.identity(identity))
}

/// Parses `CUSTOM_HEADERS` ("Name:Value,Name2:Value2") into a header map.
pub fn configure_custom_headers(custom_headers_str: Option<&str>) -> Result<HeaderMap, ClientError> {
    let mut parsed_headers = HeaderMap::new();

    let headers_str = match custom_headers_str {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(parsed_headers),
    };

    for pair in parse_headers_with_escapes(headers_str) {
        let pair = pair.trim();
        let Some((name, value)) = pair.split_once(':') else {
            return Err(ClientError::Header(format!(
                "'{}'. Expected 'Name:Value'.",
                pair
            )));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Header(format!("empty name in '{}'", pair)));
        }

        let header_name = HeaderName::from_str(name)
            .map_err(|e| ClientError::Header(format!("{}: '{}'", e, name)))?;
        let header_value = HeaderValue::from_str(value.trim())
            .map_err(|e| ClientError::Header(format!("{}: value for '{}'", e, name)))?;

        parsed_headers.insert(header_name, header_value);
    }

    Ok(parsed_headers)
}
