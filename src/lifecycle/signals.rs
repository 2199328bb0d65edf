//! OS signal handling.

/// Resolve on Ctrl+C (SIGINT).
///
/// If the handler cannot be installed this never resolves, and the process
/// keeps running until it is killed.
pub async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
