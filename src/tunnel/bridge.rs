//! Bidirectional copy between a TCP stream and a WebSocket.
//!
//! # Data Flow
//! ```text
//! TCP read (≤ 32 KiB) ──── one binary message per read ────→ WebSocket
//! TCP write_all  ←──── full payload of each message ──────── WebSocket
//! ```
//!
//! # Design Decisions
//! - No reassembly or splitting: message boundaries follow TCP read chunks
//! - The first direction to fail ends the bridge; the other direction's
//!   pending read or write is cancelled when its future is dropped
//! - The bridge never closes the streams; the session owns them

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Largest TCP read forwarded as a single WebSocket message.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Error type produced by either WebSocket implementation.
pub type WsError = Box<dyn std::error::Error + Send + Sync>;

/// What a received WebSocket message means to the bridge.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Payload to write to TCP.
    Data(Bytes),
    /// Ping/pong, answered by the WebSocket library.
    Control,
    /// Close frame, with its status code when present.
    Close(Option<u16>),
}

/// A WebSocket message type the bridge can send and receive.
///
/// Implemented for the server side (axum) and the client side
/// (tokio-tungstenite) message types.
pub trait WsMessage: Sized {
    fn binary(payload: Bytes) -> Self;
    fn into_inbound(self) -> Inbound;
}

impl WsMessage for tokio_tungstenite::tungstenite::Message {
    fn binary(payload: Bytes) -> Self {
        Self::Binary(payload)
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Binary(data) => Inbound::Data(data),
            Self::Text(text) => Inbound::Data(Bytes::copy_from_slice(text.as_str().as_bytes())),
            Self::Close(frame) => Inbound::Close(frame.map(|f| u16::from(f.code))),
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => Inbound::Control,
        }
    }
}

impl WsMessage for axum::extract::ws::Message {
    fn binary(payload: Bytes) -> Self {
        Self::Binary(payload)
    }

    fn into_inbound(self) -> Inbound {
        match self {
            Self::Binary(data) => Inbound::Data(data),
            Self::Text(text) => Inbound::Data(Bytes::copy_from_slice(text.as_str().as_bytes())),
            Self::Close(frame) => Inbound::Close(frame.map(|f| f.code)),
            Self::Ping(_) | Self::Pong(_) => Inbound::Control,
        }
    }
}

/// One half of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TcpToWs,
    WsToTcp,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::TcpToWs => f.write_str("tcp->ws"),
            Direction::WsToTcp => f.write_str("ws->tcp"),
        }
    }
}

/// Why a bridge stopped.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("TCP peer closed the connection")]
    TcpClosed,
    #[error("TCP read error: {0}")]
    TcpRead(#[source] std::io::Error),
    #[error("TCP write error: {0}")]
    TcpWrite(#[source] std::io::Error),
    #[error("WebSocket closed by peer{}", close_code(.0))]
    WsClosed(Option<u16>),
    #[error("WebSocket read error: {0}")]
    WsRead(#[source] WsError),
    #[error("WebSocket write error: {0}")]
    WsWrite(#[source] WsError),
}

fn close_code(code: &Option<u16>) -> String {
    code.map(|c| format!(" (code {})", c)).unwrap_or_default()
}

impl BridgeError {
    /// An orderly close by either peer rather than a transport failure.
    pub fn is_peer_close(&self) -> bool {
        matches!(self, BridgeError::TcpClosed | BridgeError::WsClosed(_))
    }
}

/// Result of a finished bridge.
#[derive(Debug)]
pub struct BridgeOutcome {
    /// The first failure observed.
    pub error: BridgeError,
    /// The direction that observed it.
    pub failed: Direction,
    pub bytes_tcp_to_ws: u64,
    pub bytes_ws_to_tcp: u64,
}

/// Copy in both directions until one of them fails.
pub async fn run<W, M, E>(tcp: &mut TcpStream, ws: &mut W) -> BridgeOutcome
where
    W: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin,
    M: WsMessage,
    E: Into<WsError>,
{
    let (mut tcp_rx, mut tcp_tx) = tcp.split();
    let (mut ws_tx, mut ws_rx) = StreamExt::split(&mut *ws);
    let mut bytes_tcp_to_ws = 0;
    let mut bytes_ws_to_tcp = 0;

    let (failed, error) = tokio::select! {
        e = tcp_to_ws(&mut tcp_rx, &mut ws_tx, &mut bytes_tcp_to_ws) => (Direction::TcpToWs, e),
        e = ws_to_tcp(&mut ws_rx, &mut tcp_tx, &mut bytes_ws_to_tcp) => (Direction::WsToTcp, e),
    };

    BridgeOutcome {
        error,
        failed,
        bytes_tcp_to_ws,
        bytes_ws_to_tcp,
    }
}

async fn tcp_to_ws<R, S, M, E>(tcp: &mut R, ws: &mut S, forwarded: &mut u64) -> BridgeError
where
    R: AsyncRead + Unpin,
    S: Sink<M, Error = E> + Unpin,
    M: WsMessage,
    E: Into<WsError>,
{
    tracing::debug!("Starting TCP -> WebSocket forwarding");
    loop {
        let mut buf = BytesMut::zeroed(CHUNK_SIZE);
        let n = match tcp.read(&mut buf).await {
            Ok(0) => return BridgeError::TcpClosed,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "TCP read error");
                return BridgeError::TcpRead(e);
            }
        };
        buf.truncate(n);
        tracing::trace!(bytes = n, "Read from TCP connection");

        if let Err(e) = ws.send(M::binary(buf.freeze())).await {
            let e = e.into();
            tracing::debug!(error = %e, "WebSocket write error");
            return BridgeError::WsWrite(e);
        }
        *forwarded += n as u64;
        tracing::trace!(bytes = n, "Forwarded to WebSocket");
    }
}

async fn ws_to_tcp<S, W, M, E>(ws: &mut S, tcp: &mut W, forwarded: &mut u64) -> BridgeError
where
    S: Stream<Item = Result<M, E>> + Unpin,
    W: AsyncWrite + Unpin,
    M: WsMessage,
    E: Into<WsError>,
{
    tracing::debug!("Starting WebSocket -> TCP forwarding");
    loop {
        let message = match ws.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                let e = e.into();
                tracing::debug!(error = %e, "WebSocket read error");
                return BridgeError::WsRead(e);
            }
            None => return BridgeError::WsClosed(None),
        };

        let payload = match message.into_inbound() {
            Inbound::Data(payload) => payload,
            Inbound::Control => continue,
            Inbound::Close(code) => return BridgeError::WsClosed(code),
        };
        tracing::trace!(bytes = payload.len(), "Read from WebSocket");

        if let Err(e) = tcp.write_all(&payload).await {
            tracing::debug!(error = %e, "TCP write error");
            return BridgeError::TcpWrite(e);
        }
        *forwarded += payload.len() as u64;
        tracing::trace!(bytes = payload.len(), "Forwarded to TCP");
    }
}
