//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, upgrade path and proxy URL for the selected role
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TunnelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::address::split_host_port;
use crate::config::schema::{Mode, OriginPolicy, TunnelConfig};
use crate::net::proxy::ProxyTarget;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("mode is required (must be 'server' or 'client')")]
    MissingMode,
    #[error("{field}: '{value}' is not a host:port address")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field}: upgrade path '{value}' {reason}")]
    InvalidPath {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
    #[error("client.proxy: {0}")]
    InvalidProxy(String),
    #[error("server.origin_policy: allow_list must contain at least one non-empty origin")]
    InvalidOriginList,
    #[error("observability.metrics_address: '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate the sections relevant to the configured mode.
pub fn validate_config(config: &TunnelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.mode {
        None => errors.push(ValidationError::MissingMode),
        Some(Mode::Server) => validate_server(config, &mut errors),
        Some(Mode::Client) => validate_client(config, &mut errors),
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &TunnelConfig, errors: &mut Vec<ValidationError>) {
    let server = &config.server;
    check_address("server.listen", &server.listen, errors);
    check_address("server.target", &server.target, errors);
    check_path("server.path", &server.path, errors);

    if server.tls.cert_path.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "server.tls.cert_path" });
    }
    if server.tls.key_path.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "server.tls.key_path" });
    }

    if let OriginPolicy::AllowList(origins) = &server.origin_policy {
        if origins.is_empty() || origins.iter().any(|o| o.trim().is_empty()) {
            errors.push(ValidationError::InvalidOriginList);
        }
    }
}

fn validate_client(config: &TunnelConfig, errors: &mut Vec<ValidationError>) {
    let client = &config.client;
    check_address("client.listen", &client.listen, errors);
    check_address("client.remote", &client.remote, errors);
    check_path("client.path", &client.path, errors);

    if let Some(proxy) = &client.proxy {
        if let Err(e) = ProxyTarget::parse(proxy) {
            errors.push(ValidationError::InvalidProxy(e.to_string()));
        }
    }
    if let Some(ca_file) = &client.ca_file {
        if ca_file.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "client.ca_file" });
        }
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if split_host_port(value).is_none() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_path(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if let Err(reason) = check_upgrade_path(value) {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
            reason,
        });
    }
}

/// The upgrade path is routed as a literal, so router pattern syntax
/// (`*wildcard`, `:param`, `{capture}`) is refused.
pub fn check_upgrade_path(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("must start with '/'");
    }
    if path.contains(['*', '{', '}']) {
        return Err("must not contain '*', '{' or '}'");
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err("must not have segments starting with ':'");
    }
    Ok(())
}
