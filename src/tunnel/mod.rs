//! Tunnel subsystem: the two endpoint roles and the byte bridge between them.
//!
//! # Data Flow
//! ```text
//! Client role:
//!     local TCP accept → client.rs (dial wss://) → session.rs → bridge.rs
//!
//! Server role:
//!     HTTPS upgrade → server.rs (dial TCP target) → session.rs → bridge.rs
//! ```
//!
//! # Design Decisions
//! - One session per accepted connection, nothing shared between sessions
//! - No pooling, reconnection or multiplexing
//! - A session ends when either direction fails and closes both streams

pub mod bridge;
pub mod client;
pub mod server;
pub mod session;

pub use client::TunnelClient;
pub use server::TunnelServer;

use crate::config::{Mode, TunnelConfig};
use crate::error::TunnelError;
use crate::lifecycle::Shutdown;

/// Start the endpoint selected by `config.mode` and serve until shutdown.
pub async fn run(config: TunnelConfig, shutdown: &Shutdown) -> Result<(), TunnelError> {
    let rx = shutdown.subscribe();
    match config.mode {
        Some(Mode::Server) => TunnelServer::bind(config.server).await?.run(rx).await,
        Some(Mode::Client) => TunnelClient::bind(config.client).await?.run(rx).await,
        None => Err(TunnelError::MissingMode),
    }
}
