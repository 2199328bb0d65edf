//! Server endpoint.
//!
//! # Responsibilities
//! - Terminate TLS and serve the single upgrade path
//! - Apply the origin policy before upgrading
//! - Dial the TCP target for each upgraded WebSocket
//! - Hand both streams to a session
//!
//! # Data Flow
//! ```text
//! client endpoint → TLS (axum-server/rustls) → axum router → WebSocketUpgrade
//!     → TCP dial → session → TCP target
//! ```
//!
//! # Design Decisions
//! - Certificate and key are loaded before the socket is bound
//! - Every request on the upgrade path is an upgrade attempt; anything else 404s
//! - Each upgraded connection runs on its own task (spawned by hyper)

use std::net::SocketAddr;
use std::path::Path;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::address::{dial_addr, listen_addr};
use crate::config::validation::{check_upgrade_path, ValidationError};
use crate::config::{ConfigError, Mode, OriginPolicy, ServerConfig};
use crate::error::TunnelError;
use crate::lifecycle::shutdown::signalled;
use crate::net::connection::SessionTracker;
use crate::net::listener::ListenerError;
use crate::net::tls::load_server_tls;
use crate::observability::metrics;
use crate::tunnel::session::{close_ws, Session};

/// State shared by every upgrade.
#[derive(Clone)]
struct AppState {
    target: String,
    origin_policy: OriginPolicy,
    tracker: SessionTracker,
}

/// HTTPS listener that turns WebSocket upgrades into TCP connections.
pub struct TunnelServer {
    listener: std::net::TcpListener,
    tls: RustlsConfig,
    path: String,
    state: AppState,
}

impl TunnelServer {
    /// Load the certificate and key, then bind the listen address.
    pub async fn bind(config: ServerConfig) -> Result<Self, TunnelError> {
        if let Err(reason) = check_upgrade_path(&config.path) {
            return Err(ConfigError::Validation(vec![ValidationError::InvalidPath {
                field: "server.path",
                value: config.path,
                reason,
            }])
            .into());
        }

        let tls = load_server_tls(
            Path::new(&config.tls.cert_path),
            Path::new(&config.tls.key_path),
        )
        .await?;

        let addr = listen_addr(&config.listen);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .and_then(|listener| listener.into_std())
            .map_err(|source| ListenerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let local = listener.local_addr().map_err(TunnelError::Serve)?;
        tracing::info!(address = %local, path = %config.path, "WebSocket server starting");
        tracing::debug!(
            tcp_addr = %config.target,
            cert = %config.tls.cert_path,
            key = %config.tls.key_path,
            "Server configuration"
        );

        Ok(Self {
            listener,
            tls,
            path: config.path,
            state: AppState {
                target: dial_addr(&config.target),
                origin_policy: config.origin_policy,
                tracker: SessionTracker::new(),
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Live session counter.
    pub fn tracker(&self) -> SessionTracker {
        self.state.tracker.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), TunnelError> {
        let handle = Handle::new();
        let watcher = handle.clone();
        tokio::spawn(async move {
            signalled(&mut shutdown).await;
            tracing::info!("Server received shutdown signal, closing listener");
            watcher.shutdown();
        });

        let app = build_router(&self.path, self.state);
        axum_server::from_tcp_rustls(self.listener, self.tls)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(TunnelError::Serve)?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

fn build_router(path: &str, state: AppState) -> Router {
    Router::new()
        .route(path, any(upgrade_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    tracing::debug!(peer_addr = %peer, "New WebSocket connection request");

    if !origin_allowed(&state.origin_policy, &headers) {
        tracing::warn!(
            peer_addr = %peer,
            origin = ?headers.get(header::ORIGIN),
            "WebSocket upgrade rejected: origin not allowed"
        );
        metrics::upgrade_failed("origin");
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::error!(peer_addr = %peer, error = %rejection, "WebSocket upgrade failed");
            metrics::upgrade_failed("handshake");
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(move |e| {
            tracing::error!(peer_addr = %peer, error = %e, "WebSocket upgrade failed");
            metrics::upgrade_failed("upgrade");
        })
        .on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// An `Origin` header that is present but not valid UTF-8 only passes
/// under `AnyOrigin`.
fn origin_allowed(policy: &OriginPolicy, headers: &HeaderMap) -> bool {
    match headers.get(header::ORIGIN).map(HeaderValue::to_str) {
        None => policy.allows(None),
        Some(Ok(origin)) => policy.allows(Some(origin)),
        Some(Err(_)) => matches!(policy, OriginPolicy::AnyOrigin),
    }
}

async fn handle_socket(mut socket: WebSocket, peer: SocketAddr, state: AppState) {
    let session = Session::pending(Mode::Server, peer, &state.tracker);
    tracing::info!(session_id = %session.id(), peer_addr = %peer, "WebSocket connection established");
    tracing::debug!(session_id = %session.id(), tcp_addr = %state.target, "Attempting TCP connection");

    match TcpStream::connect(&state.target).await {
        Ok(tcp) => {
            let _ = tcp.set_nodelay(true);
            tracing::info!(session_id = %session.id(), tcp_addr = %state.target, "TCP connection established");
            session.run(tcp, socket).await;
        }
        Err(e) => {
            tracing::error!(session_id = %session.id(), tcp_addr = %state.target, error = %e, "TCP connection failed");
            metrics::dial_failed(Mode::Server);
            close_ws::<_, Message>(&mut socket).await;
            session.abandon(&e);
        }
    }
}
