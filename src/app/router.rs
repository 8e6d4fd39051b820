use crate::handler::ApiState;
use crate::handler::events::{
    category_handler, comment_handler, like_handler, offline_handler, publish_handler,
};
use crate::handler::feed::feed_page_handler;
use crate::handler::health::health_handler;
use crate::handler::pin::{pin_handler, unpin_handler};
use crate::handler::view::view_handler;
use axum::Router;
use axum::routing::{get, post};

/// Build the HTTP router: reads for the presentation layer, events from
/// the content layer.
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/feed", get(feed_page_handler))
        .route("/v1/feed/view", post(view_handler))
        .route("/v1/feed/publish", post(publish_handler))
        .route("/v1/feed/comment", post(comment_handler))
        .route("/v1/feed/like", post(like_handler))
        .route("/v1/feed/category", post(category_handler))
        .route("/v1/feed/offline", post(offline_handler))
        .route("/v1/feed/pin", post(pin_handler))
        .route("/v1/feed/unpin", post(unpin_handler))
        .with_state(state)
}
