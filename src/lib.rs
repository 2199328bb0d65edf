//! TCP-over-WebSocket tunnel library.
//!
//! A client endpoint accepts local TCP connections and carries each one over
//! its own `wss://` connection; a server endpoint accepts those upgrades and
//! forwards the bytes to a fixed TCP target.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod tunnel;

pub use config::schema::TunnelConfig;
pub use error::TunnelError;
pub use lifecycle::Shutdown;
pub use tunnel::{TunnelClient, TunnelServer};
