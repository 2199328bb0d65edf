//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoints and sessions produce:
//!     → logging.rs (structured log events, session_id / peer_addr fields)
//!     → metrics.rs (session counters, byte counters, failure counters)
//!
//! Consumers:
//!     → stderr/stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```

pub mod logging;
pub mod metrics;
