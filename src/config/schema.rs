//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults matching the command-line defaults.

use serde::{Deserialize, Serialize};

/// Upgrade path used when none is configured.
pub const DEFAULT_UPGRADE_PATH: &str = "/proxy";

/// Root configuration for the tunnel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Which role this process runs in. Required before startup.
    pub mode: Option<Mode>,

    /// Server role settings (TLS listener, TCP target).
    pub server: ServerConfig,

    /// Client role settings (local listener, remote WebSocket endpoint).
    pub client: ClientConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Operating role of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Accept WebSocket upgrades over TLS and forward them to a TCP target.
    Server,
    /// Accept local TCP connections and forward them over WebSocket.
    Client,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Server => "server",
            Mode::Client => "client",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server role configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTPS listen address (e.g., ":8080" or "0.0.0.0:8080").
    pub listen: String,

    /// TCP address every upgraded session is forwarded to.
    pub target: String,

    /// The single path that accepts WebSocket upgrades.
    pub path: String,

    /// Certificate and private key for the HTTPS listener.
    pub tls: TlsConfig,

    /// Which `Origin` headers are accepted on upgrade.
    pub origin_policy: OriginPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: ":8080".to_string(),
            target: ":9000".to_string(),
            path: DEFAULT_UPGRADE_PATH.to_string(),
            tls: TlsConfig::default(),
            origin_policy: OriginPolicy::default(),
        }
    }
}

/// TLS configuration for the server listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "server.crt".to_string(),
            key_path: "server.key".to_string(),
        }
    }
}

/// Origin check applied to upgrade requests.
///
/// The tunnel is not a browser-facing service, so every origin is accepted
/// unless an allow-list is configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OriginPolicy {
    /// Accept any `Origin` header, or none at all.
    #[default]
    AnyOrigin,
    /// Accept requests without an `Origin` header, or whose origin is listed.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Whether a request carrying `origin` may be upgraded.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (OriginPolicy::AnyOrigin, _) => true,
            (OriginPolicy::AllowList(_), None) => true,
            (OriginPolicy::AllowList(allowed), Some(origin)) => allowed
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(origin)),
        }
    }
}

/// Client role configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local TCP listen address.
    pub listen: String,

    /// Remote WebSocket endpoint as `host:port`.
    pub remote: String,

    /// Upgrade path on the remote endpoint.
    pub path: String,

    /// Optional HTTP proxy URL used to reach `remote` (e.g., "http://proxy:3128").
    pub proxy: Option<String>,

    /// Verify the server certificate chain and hostname.
    pub verify_tls: bool,

    /// Extra PEM root certificate(s) trusted when verifying the server.
    pub ca_file: Option<String>,

    /// Upper bound for establishing the WebSocket connection (0 = unbounded).
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen: ":9000".to_string(),
            remote: ":8080".to_string(),
            path: DEFAULT_UPGRADE_PATH.to_string(),
            proxy: None,
            verify_tls: true,
            ca_file: None,
            connect_timeout_secs: 0,
        }
    }
}

/// Minimum severity of emitted log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    #[value(alias = "warning")]
    Warn,
    #[serde(alias = "fatal", alias = "panic")]
    #[value(aliases = ["fatal", "panic"])]
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format of the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Minimum log level.
    pub log_level: LogLevel,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
