//! TCP listener for the client role.
//!
//! # Responsibilities
//! - Bind to the configured local address
//! - Accept incoming TCP connections
//! - Report accept errors without tearing the listener down

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::config::address::listen_addr;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A TCP listener handing out connections one at a time.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `addr`; a bare `:port` binds every interface.
    pub async fn bind(addr: &str) -> Result<Self, ListenerError> {
        let addr = listen_addr(addr);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ListenerError::Bind { addr: addr.clone(), source })?;

        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(address = %local_addr, "TCP listener started");
        }

        Ok(Self { inner: listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(peer_addr = %addr, "New TCP connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
