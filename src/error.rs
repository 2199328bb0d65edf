//! Top-level error type for startup and endpoint failures.
//!
//! Per-session failures never surface here; they end the session and are
//! logged. Everything in this enum is fatal to the process.

use crate::config::ConfigError;
use crate::net::listener::ListenerError;
use crate::net::proxy::ProxyError;
use crate::net::tls::TlsError;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("Invalid proxy: {0}")]
    Proxy(#[from] ProxyError),
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("No mode selected")]
    MissingMode,
}
