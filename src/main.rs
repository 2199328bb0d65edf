//! TCP over WebSocket tunnel.
//!
//! # Architecture Overview
//!
//! ```text
//!   local app                 client mode                         server mode                TCP target
//!  ───────────▶ ┌──────────────────────────────┐   wss://…/proxy   ┌──────────────────────────────┐ ───────────▶
//!     TCP       │ net::listener → tunnel::client│ ════════════════▶│ tunnel::server (axum + TLS)  │    TCP
//!               │   (proxy CONNECT, TLS, dial)  │  one binary msg  │   (origin check, upgrade)    │
//!  ◀─────────── │ tunnel::session ⇄ bridge      │ ◀════════════════│ tunnel::session ⇄ bridge     │ ◀───────────
//!               └──────────────────────────────┘    per TCP read   └──────────────────────────────┘
//!
//!               ┌────────────────────────────────────────────────────────────────────────────┐
//!               │ Cross-cutting: config (cli/toml) · observability (tracing, metrics) ·       │
//!               │                lifecycle (Ctrl+C → stop accepting)                          │
//!               └────────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use ws_tunnel::config::Cli;
use ws_tunnel::lifecycle::Shutdown;
use ws_tunnel::net::tls::install_crypto_provider;
use ws_tunnel::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.observability);
    install_crypto_provider();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        "ws-tunnel starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    if let Err(e) = ws_tunnel::tunnel::run(config, &shutdown).await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
