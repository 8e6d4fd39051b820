mod router;
pub mod server;
mod state;
pub mod tracing;

use crate::config;
use crate::error::FeedRankError;
use tokio_util::sync::CancellationToken;

/// Application entry point. Initializes tracing, configuration, and starts
/// the server plus background loops.
pub async fn run() -> Result<(), FeedRankError> {
    tracing::init_tracing();

    let settings =
        config::get_configuration().map_err(|e| FeedRankError::Config(e.to_string()))?;
    ::tracing::info!("Loaded settings");

    // Shared shutdown token: server, flush loop, score worker, daemon.
    let shutdown_token = CancellationToken::new();

    let app_state = state::AppState::from_settings(&settings, shutdown_token.clone()).await?;
    let app = router::api_router(app_state.api.clone());

    server::serve(app, settings.http_bind, shutdown_token).await?;

    // Let the flush loop and score worker finish their final drain.
    for handle in app_state.background {
        if let Err(e) = handle.await {
            ::tracing::error!("background task failed during shutdown: {e}");
        }
    }
    Ok(())
}
