//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (cli.rs)
//!     → optional config file (loader.rs, TOML)
//!     → explicit flags layered on top
//!     → validation.rs (semantic checks for the selected mode)
//!     → TunnelConfig (validated, immutable)
//!     → role-specific section handed to the client or server endpoint
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod address;
pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::{
    ClientConfig, LogFormat, LogLevel, Mode, ObservabilityConfig, OriginPolicy, ServerConfig,
    TlsConfig, TunnelConfig,
};
