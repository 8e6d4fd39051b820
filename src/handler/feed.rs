use crate::domain::{FeedEntry, ListVariant};
use crate::handler::ApiState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Deserialize)]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub tab: Option<String>,
}

#[derive(Serialize)]
pub struct FeedPageResponse {
    pub page: u32,
    pub total: i64,
    pub degraded: bool,
    pub items: Vec<FeedEntry>,
}

/// Handler for GET /v1/feed?page=&tab=
pub async fn feed_page_handler(
    State(state): State<ApiState>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let variant = match query.tab.as_deref() {
        None => ListVariant::Default,
        Some(tab) => match ListVariant::parse(tab) {
            Some(variant) => variant,
            None => return (StatusCode::BAD_REQUEST, "Unknown tab").into_response(),
        },
    };

    match state.service.feed_page(page, variant).await {
        Ok(result) => Json(FeedPageResponse {
            page,
            total: result.total,
            degraded: result.degraded,
            items: result.items,
        })
        .into_response(),
        Err(e) => {
            error!(page, ?variant, error = %e, "failed to build feed page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Feed unavailable").into_response()
        }
    }
}
