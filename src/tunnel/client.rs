//! Client endpoint.
//!
//! # Responsibilities
//! - Accept local TCP connections
//! - Dial `wss://<remote><path>` for each one, directly or through an HTTP proxy
//! - Hand both streams to a session
//!
//! # Data Flow
//! ```text
//! local app → TCP listener → [HTTP CONNECT proxy] → TLS → WebSocket → server endpoint
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::config::address::dial_addr;
use crate::config::{ClientConfig, Mode};
use crate::error::TunnelError;
use crate::lifecycle::shutdown::signalled;
use crate::net::connection::SessionTracker;
use crate::net::listener::Listener;
use crate::net::proxy::{ProxyError, ProxyTarget};
use crate::net::tls::client_tls_config;
use crate::observability::metrics;
use crate::tunnel::session::Session;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// Byte stream the WebSocket handshake runs over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// WebSocket produced by a successful dial.
pub type ClientSocket = WebSocketStream<MaybeTlsStream<Box<dyn Transport>>>;

/// Error type for outbound WebSocket dials.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Dials the remote WebSocket endpoint.
pub struct Dialer {
    url: String,
    authority: String,
    proxy: Option<ProxyTarget>,
    tls: Arc<rustls::ClientConfig>,
    connect_timeout: Option<Duration>,
}

impl Dialer {
    pub fn new(config: &ClientConfig) -> Result<Self, TunnelError> {
        let authority = dial_addr(&config.remote);
        let proxy = config.proxy.as_deref().map(ProxyTarget::parse).transpose()?;
        let tls = client_tls_config(config.verify_tls, config.ca_file.as_deref().map(Path::new))?;

        Ok(Self {
            url: format!("wss://{}{}", authority, config.path),
            authority,
            proxy,
            tls,
            connect_timeout: (config.connect_timeout_secs > 0)
                .then(|| Duration::from_secs(config.connect_timeout_secs)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a new WebSocket connection. Nothing is reused between calls.
    pub async fn dial(&self) -> Result<ClientSocket, DialError> {
        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.dial_once())
                .await
                .map_err(|_| DialError::Timeout(limit))?,
            None => self.dial_once().await,
        }
    }

    async fn dial_once(&self) -> Result<ClientSocket, DialError> {
        let stream: Box<dyn Transport> = match &self.proxy {
            Some(proxy) => {
                tracing::debug!(proxy = %proxy.address(), "Using proxy");
                Box::new(proxy.connect(&self.authority).await?)
            }
            None => {
                let tcp = TcpStream::connect(&self.authority).await.map_err(|source| {
                    DialError::Connect {
                        addr: self.authority.clone(),
                        source,
                    }
                })?;
                let _ = tcp.set_nodelay(true);
                Box::new(tcp)
            }
        };

        let connector = Connector::Rustls(Arc::clone(&self.tls));
        let (ws, _response) =
            client_async_tls_with_config(self.url.as_str(), stream, None, Some(connector)).await?;
        Ok(ws)
    }
}

/// Accepts local TCP connections and tunnels each over its own WebSocket.
pub struct TunnelClient {
    listener: Listener,
    dialer: Arc<Dialer>,
    tracker: SessionTracker,
}

impl TunnelClient {
    /// Prepare the dialer, then bind the local listener.
    pub async fn bind(config: ClientConfig) -> Result<Self, TunnelError> {
        let dialer = Dialer::new(&config)?;
        if !config.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for outbound WebSocket connections");
        }

        let listener = Listener::bind(&config.listen).await?;
        tracing::debug!(
            url = %dialer.url(),
            proxy = config.proxy.is_some(),
            verify_tls = config.verify_tls,
            "Client configuration"
        );

        Ok(Self {
            listener,
            dialer: Arc::new(dialer),
            tracker: SessionTracker::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Live session counter.
    pub fn tracker(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Accept until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), TunnelError> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let dialer = Arc::clone(&self.dialer);
                        let tracker = self.tracker.clone();
                        tokio::spawn(handle_connection(stream, peer, dialer, tracker));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                },
                _ = signalled(&mut shutdown) => {
                    tracing::info!("Client received shutdown signal, closing listener");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    mut tcp: TcpStream,
    peer: SocketAddr,
    dialer: Arc<Dialer>,
    tracker: SessionTracker,
) {
    let session = Session::pending(Mode::Client, peer, &tracker);
    tracing::debug!(session_id = %session.id(), url = %dialer.url(), "Attempting WebSocket connection");

    match dialer.dial().await {
        Ok(ws) => {
            tracing::info!(
                session_id = %session.id(),
                peer_addr = %peer,
                url = %dialer.url(),
                "WebSocket connection established"
            );
            session.run(tcp, ws).await;
        }
        Err(e) => {
            tracing::error!(session_id = %session.id(), peer_addr = %peer, error = %e, "WebSocket connection failed");
            metrics::dial_failed(Mode::Client);
            let _ = tcp.shutdown().await;
            session.abandon(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;

    fn config(remote: &str) -> ClientConfig {
        ClientConfig {
            listen: "127.0.0.1:0".to_string(),
            remote: remote.to_string(),
            verify_tls: false,
            ..ClientConfig::default()
        }
    }

    #[test]
    fn dialer_builds_wss_url() {
        let dialer = Dialer::new(&config("tunnel.example.com:8443")).unwrap();
        assert_eq!(dialer.url(), "wss://tunnel.example.com:8443/proxy");
    }

    #[test]
    fn dialer_rejects_bad_proxy() {
        let mut config = config("tunnel.example.com:8443");
        config.proxy = Some("ftp://proxy:21".to_string());
        assert!(matches!(
            Dialer::new(&config),
            Err(TunnelError::Proxy(ProxyError::UnsupportedScheme(_)))
        ));
    }

    #[tokio::test]
    async fn dial_refused_is_connect_error() {
        // Grab a free port and release it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let dialer = Dialer::new(&config(&format!("127.0.0.1:{port}"))).unwrap();
        assert!(matches!(dialer.dial().await, Err(DialError::Connect { .. })));
    }

    #[tokio::test]
    async fn failed_dial_closes_local_connection() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = TunnelClient::bind(config(&format!("127.0.0.1:{port}")))
            .await
            .unwrap();
        let addr = client.local_addr().unwrap();
        let tracker = client.tracker();
        let (_tx, rx) = broadcast::channel(1);
        tokio::spawn(client.run(rx));

        let mut conn = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(5), conn.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.active_count(), 0);
    }
}
