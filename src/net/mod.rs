//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client role:
//!     listener.rs (local accept loop)
//!     → proxy.rs (optional HTTP CONNECT tunnel)
//!     → tls.rs (client connector, verification policy)
//!     → hand off to the tunnel layer
//!
//! Server role:
//!     tls.rs (certificate + key) → HTTPS listener → hand off to the tunnel layer
//!
//! Session states (connection.rs):
//!     Pending → Active → Closed
//! ```
//!
//! # Design Decisions
//! - Accept errors are logged and never stop the listener
//! - TLS material is loaded before any socket is bound
//! - Proxy traversal produces a plain byte stream; TLS runs end-to-end on top

pub mod connection;
pub mod listener;
pub mod proxy;
pub mod tls;
