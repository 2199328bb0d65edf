//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use ws_tunnel::config::{ClientConfig, OriginPolicy, ServerConfig, TlsConfig};
use ws_tunnel::lifecycle::Shutdown;
use ws_tunnel::net::connection::SessionTracker;
use ws_tunnel::{TunnelClient, TunnelServer};

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// A free loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Start a TCP target that echoes everything back on every connection.
pub async fn start_echo_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rx, mut tx) = socket.split();
                let _ = tokio::io::copy(&mut rx, &mut tx).await;
                let _ = tx.shutdown().await;
            });
        }
    });
    addr
}

pub fn server_config(target: SocketAddr) -> ServerConfig {
    ServerConfig {
        listen: "127.0.0.1:0".to_string(),
        target: target.to_string(),
        tls: TlsConfig {
            cert_path: fixture("server.crt"),
            key_path: fixture("server.key"),
        },
        origin_policy: OriginPolicy::AnyOrigin,
        ..ServerConfig::default()
    }
}

/// Client config trusting the test CA.
pub fn client_config(remote: SocketAddr) -> ClientConfig {
    ClientConfig {
        listen: "127.0.0.1:0".to_string(),
        remote: remote.to_string(),
        verify_tls: true,
        ca_file: Some(fixture("ca.crt")),
        ..ClientConfig::default()
    }
}

/// A running endpoint, stopped when `shutdown` is triggered.
pub struct Running {
    pub addr: SocketAddr,
    pub tracker: SessionTracker,
    pub shutdown: Shutdown,
}

pub async fn start_server(config: ServerConfig) -> Running {
    let shutdown = Shutdown::new();
    let server = TunnelServer::bind(config).await.unwrap();
    let running = Running {
        addr: server.local_addr().unwrap(),
        tracker: server.tracker(),
        shutdown: shutdown.clone(),
    };
    tokio::spawn(server.run(shutdown.subscribe()));
    running
}

pub async fn start_client(config: ClientConfig) -> Running {
    let shutdown = Shutdown::new();
    let client = TunnelClient::bind(config).await.unwrap();
    let running = Running {
        addr: client.local_addr().unwrap(),
        tracker: client.tracker(),
        shutdown: shutdown.clone(),
    };
    tokio::spawn(client.run(shutdown.subscribe()));
    running
}

/// Server in front of `target` plus a client pointed at it.
pub async fn start_tunnel(target: SocketAddr) -> (Running, Running) {
    let server = start_server(server_config(target)).await;
    let client = start_client(client_config(server.addr)).await;
    (server, client)
}

/// Start a minimal HTTP proxy that only understands `CONNECT`.
///
/// Returns its address and the number of tunnels it has opened.
pub async fn start_connect_proxy() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tunnels = Arc::new(AtomicUsize::new(0));
    let counter = tunnels.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.is_err() {
                    return;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => continue,
                    }
                }

                let mut parts = request_line.split_whitespace();
                let (Some("CONNECT"), Some(authority)) = (parts.next(), parts.next()) else {
                    let _ = reader
                        .get_mut()
                        .write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n")
                        .await;
                    return;
                };

                let Ok(mut upstream) = TcpStream::connect(authority).await else {
                    let _ = reader
                        .get_mut()
                        .write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n")
                        .await;
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut client = reader.into_inner();
                if client
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .await
                    .is_err()
                {
                    return;
                }
                let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
            });
        }
    });

    (addr, tunnels)
}

/// Write `payload` and read back exactly as many bytes.
pub async fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.unwrap();
    let mut received = vec![0u8; payload.len()];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut received))
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    received
}

/// Wait until `stream` reports end of stream (or an error).
pub async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let closed = tokio::time::timeout(TIMEOUT, async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed");
}

/// Poll `tracker` until no sessions are left.
pub async fn wait_for_idle(tracker: &SessionTracker) {
    let idle = tokio::time::timeout(TIMEOUT, async {
        while tracker.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(idle.is_ok(), "sessions still active: {}", tracker.active_count());
}
