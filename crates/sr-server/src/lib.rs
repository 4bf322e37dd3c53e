//! sr-server: the HTTP control plane.
//!
//! Exposes stream start/stop/status, the relay log (as JSON and as an SSE
//! stream) and the static control page, and stops the active relay on
//! graceful shutdown.

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use tokio::signal;

use sr_core::config::Config;

use crate::context::AppContext;

/// Start the streamrelay server.
///
/// Returns when a shutdown signal is received, after the active relay (if
/// any) has been stopped.
pub async fn start(config: Config) -> sr_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    if let Some(dir) = &config.server.static_dir {
        if !dir.exists() {
            match std::fs::create_dir_all(dir) {
                Ok(()) => tracing::info!("Created static directory {}", dir.display()),
                Err(e) => tracing::warn!("Failed to create static directory {}: {e}", dir.display()),
            }
        }
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    let ctx = AppContext::from_config(config)?;
    let app = router::build_router(ctx.clone());

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| sr_core::Error::Internal(format!("Failed to bind to {host}:{port}: {e}")))?;
    let bound_port = listener.local_addr().map(|a| a.port()).unwrap_or(port);

    tracing::info!("Starting server on {host}:{bound_port}");
    ctx.log
        .info(format!("Streaming server started on port {bound_port}"));

    let cancel = ctx.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            cancel.cancel();
        })
        .await?;

    ctx.supervisor.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
