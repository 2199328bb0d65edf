//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, at startup
//! - Apply the configured minimum level and output format
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` takes precedence over the configured level when set

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogLevel, ObservabilityConfig};

/// Filter directives for `level`: this crate and the HTTP trace layer at
/// `level`, everything else at `warn`.
pub fn directives(level: LogLevel) -> String {
    let level = level.as_str();
    format!("warn,ws_tunnel={level},tower_http={level}")
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(
            level = config.log_level.as_str(),
            format = ?config.log_format,
            "Logging initialised"
        ),
        Err(_) => tracing::debug!("Logging already initialised"),
    }
}
