//! Command-line interface.
//!
//! Flags mirror the config file. When `--config` is given the file is read
//! first and any flag passed explicitly overrides the file value.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{LogFormat, LogLevel, Mode, TunnelConfig};
use crate::config::validation::validate_config;

const AFTER_HELP: &str = "\
Examples:
  Start server:
    ws-tunnel --mode server --ws-addr :8080 --tcp-addr :9000 --cert server.crt --key server.key

  Start client:
    ws-tunnel --mode client --ws-addr example.com:8080 --tcp-addr :9000
    ws-tunnel --mode client --ws-addr example.com:8080 --tcp-addr :9000 --proxy http://proxy:8080

The server accepts WebSocket connections and proxies them to a TCP address.
The client accepts TCP connections and proxies them over WebSocket to the server.";

/// TCP over WebSocket proxy.
#[derive(Debug, Parser)]
#[command(name = "ws-tunnel", version, about, after_help = AFTER_HELP)]
pub struct Cli {
    /// Operation mode
    #[arg(long, value_enum, required_unless_present = "config")]
    pub mode: Option<Mode>,

    /// TOML configuration file; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// WebSocket address to listen on (server) or connect to (client) [default: :8080]
    #[arg(long, value_name = "ADDR")]
    pub ws_addr: Option<String>,

    /// TCP address to proxy to (server) or listen on (client) [default: :9000]
    #[arg(long, value_name = "ADDR")]
    pub tcp_addr: Option<String>,

    /// WebSocket upgrade path [default: /proxy]
    #[arg(long)]
    pub path: Option<String>,

    /// SSL certificate file (server mode) [default: server.crt]
    #[arg(long, value_name = "FILE")]
    pub cert: Option<String>,

    /// SSL key file (server mode) [default: server.key]
    #[arg(long, value_name = "FILE")]
    pub key: Option<String>,

    /// HTTP proxy address (client mode)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Skip server certificate verification (client mode)
    #[arg(long)]
    pub insecure: bool,

    /// Extra trusted root certificate in PEM form (client mode)
    #[arg(long, value_name = "FILE")]
    pub ca_file: Option<String>,

    /// Set log level [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log output format [default: pretty]
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Expose Prometheus metrics on this address
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<String>,
}

impl Cli {
    /// Merge flags over the optional config file and validate the result.
    pub fn into_config(self) -> Result<TunnelConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => TunnelConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut TunnelConfig) {
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }

        if let Some(ws_addr) = self.ws_addr {
            config.server.listen = ws_addr.clone();
            config.client.remote = ws_addr;
        }
        if let Some(tcp_addr) = self.tcp_addr {
            config.server.target = tcp_addr.clone();
            config.client.listen = tcp_addr;
        }
        if let Some(path) = self.path {
            config.server.path = path.clone();
            config.client.path = path;
        }

        if let Some(cert) = self.cert {
            config.server.tls.cert_path = cert;
        }
        if let Some(key) = self.key {
            config.server.tls.key_path = key;
        }

        if let Some(proxy) = self.proxy {
            config.client.proxy = Some(proxy);
        }
        if self.insecure {
            config.client.verify_tls = false;
        }
        if let Some(ca_file) = self.ca_file {
            config.client.ca_file = Some(ca_file);
        }

        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(addr) = self.metrics_addr {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }
    }
}
