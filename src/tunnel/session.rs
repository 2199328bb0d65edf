//! Session lifecycle.
//!
//! A session pairs exactly one TCP stream with exactly one WebSocket. It owns
//! both exclusively, runs the bridge over them and closes both when the bridge
//! stops, whichever side failed.

use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::Mode;
use crate::net::connection::{SessionGuard, SessionId, SessionState, SessionTracker};
use crate::observability::metrics;
use crate::tunnel::bridge::{self, BridgeOutcome, WsError, WsMessage};

/// Upper bound for sending a close frame and shutting down TCP on teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One forwarding pairing.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    role: Mode,
    peer: SocketAddr,
    state: SessionState,
    _guard: SessionGuard,
}

impl Session {
    /// Start a session whose first stream (`peer`) is established.
    pub fn pending(role: Mode, peer: SocketAddr, tracker: &SessionTracker) -> Self {
        let guard = tracker.track();
        let id = guard.id();
        tracing::debug!(session_id = %id, role = %role, peer_addr = %peer, "Session pending");
        Self {
            id,
            role,
            peer,
            state: SessionState::Pending,
            _guard: guard,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Give up before the second stream could be established.
    pub fn abandon(mut self, reason: &dyn Display) {
        self.transition(SessionState::Closed);
        tracing::debug!(
            session_id = %self.id,
            peer_addr = %self.peer,
            reason = %reason,
            "Session abandoned"
        );
    }

    /// Bridge `tcp` and `ws` until either fails, then close both.
    pub async fn run<W, M, E>(mut self, mut tcp: TcpStream, mut ws: W) -> BridgeOutcome
    where
        W: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin,
        M: WsMessage,
        E: Into<WsError>,
    {
        self.transition(SessionState::Active);
        metrics::session_started(self.role);
        tracing::debug!(session_id = %self.id, "Session active");

        let outcome = bridge::run(&mut tcp, &mut ws).await;
        close_streams::<W, M>(&mut tcp, &mut ws).await;
        self.transition(SessionState::Closed);

        metrics::session_finished(self.role, outcome.bytes_tcp_to_ws, outcome.bytes_ws_to_tcp);
        if outcome.error.is_peer_close() {
            tracing::info!(
                session_id = %self.id,
                peer_addr = %self.peer,
                direction = %outcome.failed,
                bytes_tcp_to_ws = outcome.bytes_tcp_to_ws,
                bytes_ws_to_tcp = outcome.bytes_ws_to_tcp,
                "Connection closed: {}",
                outcome.error
            );
        } else {
            tracing::warn!(
                session_id = %self.id,
                peer_addr = %self.peer,
                direction = %outcome.failed,
                bytes_tcp_to_ws = outcome.bytes_tcp_to_ws,
                bytes_ws_to_tcp = outcome.bytes_ws_to_tcp,
                "Connection closed: {}",
                outcome.error
            );
        }
        outcome
    }
}

/// Close both streams. Errors from streams that are already closed are
/// ignored, so calling this more than once is fine.
pub async fn close_streams<W, M>(tcp: &mut TcpStream, ws: &mut W)
where
    W: Sink<M> + Unpin,
{
    let closing = async {
        let (_, _) = tokio::join!(close_ws::<W, M>(ws), tcp.shutdown());
    };
    if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
        tracing::debug!("Timed out closing session streams");
    }
}

/// Send a close frame (if not already sent) and flush.
pub async fn close_ws<W, M>(ws: &mut W)
where
    W: Sink<M> + Unpin,
{
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, SinkExt::close(ws)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::bridge::BridgeError;
    use futures_util::StreamExt;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (connected.unwrap(), accepted.unwrap().0)
    }

    async fn ws_pair() -> (WebSocketStream<TcpStream>, WebSocketStream<TcpStream>) {
        let (a, b) = tcp_pair().await;
        let server = tokio::spawn(tokio_tungstenite::accept_async(a));
        let (client, _) = tokio_tungstenite::client_async("ws://localhost/proxy", b)
            .await
            .unwrap();
        (server.await.unwrap().unwrap(), client)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn tcp_close_closes_websocket() {
        let tracker = SessionTracker::new();
        let (tcp_peer, tcp) = tcp_pair().await;
        let (ws, mut ws_peer) = ws_pair().await;

        let session = Session::pending(Mode::Server, peer(), &tracker);
        assert_eq!(session.state(), SessionState::Pending);
        let running = tokio::spawn(session.run(tcp, ws));
        assert_eq!(tracker.active_count(), 1);

        drop(tcp_peer);

        // The far WebSocket end sees the close frame, then the end of stream.
        let closed = timeout(TIMEOUT, async {
            loop {
                match ws_peer.next().await {
                    Some(Ok(msg)) if msg.is_close() => return true,
                    Some(Ok(_)) => continue,
                    _ => return true,
                }
            }
        })
        .await
        .unwrap();
        assert!(closed);

        let outcome = timeout(TIMEOUT, running).await.unwrap().unwrap();
        assert!(matches!(outcome.error, BridgeError::TcpClosed));
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn websocket_close_closes_tcp() {
        let tracker = SessionTracker::new();
        let (mut tcp_peer, tcp) = tcp_pair().await;
        let (ws, mut ws_peer) = ws_pair().await;

        let running = tokio::spawn(Session::pending(Mode::Client, peer(), &tracker).run(tcp, ws));
        ws_peer.close(None).await.unwrap();

        let mut buf = [0u8; 16];
        let n = timeout(TIMEOUT, tcp_peer.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0, "TCP peer should observe end of stream");

        let outcome = timeout(TIMEOUT, running).await.unwrap().unwrap();
        assert!(matches!(outcome.error, BridgeError::WsClosed(_)));
    }

    #[tokio::test]
    async fn closing_twice_is_harmless() {
        let (_tcp_peer, mut tcp) = tcp_pair().await;
        let (mut ws, _ws_peer) = ws_pair().await;

        close_streams::<_, Message>(&mut tcp, &mut ws).await;
        close_streams::<_, Message>(&mut tcp, &mut ws).await;
    }

    #[test]
    fn abandoned_session_releases_slot() {
        let tracker = SessionTracker::new();
        let session = Session::pending(Mode::Client, peer(), &tracker);
        assert_eq!(tracker.active_count(), 1);
        session.abandon(&"dial failed");
        assert_eq!(tracker.active_count(), 0);
    }
}
