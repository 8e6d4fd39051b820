use crate::error::FeedRankError;
use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Start the HTTP server with graceful shutdown.
///
/// The `shutdown_token` is shared with the flush loop, the score worker
/// and the maintenance daemon, so pending deltas drain before the process
/// exits.
pub async fn serve(
    app: Router,
    http_bind: SocketAddr,
    shutdown_token: CancellationToken,
) -> Result<(), FeedRankError> {
    let listener = tokio::net::TcpListener::bind(http_bind)
        .await
        .map_err(|e| FeedRankError::Bind {
            address: http_bind.to_string(),
            source: e,
        })?;
    info!("Listening on {}", listener.local_addr()?);
    info!("  - GET  /v1/health        (health check)");
    info!("  - GET  /v1/feed          (ranked feed pages)");
    info!("  - POST /v1/feed/view     (page views)");
    info!("  - POST /v1/feed/publish  (content events)");
    info!("  - POST /v1/feed/pin      (pin overrides)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_token.cancel();
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
