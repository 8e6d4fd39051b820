//! Event endpoints consumed by the content layer.
//!
//! These always answer 200: the publish/comment/like already succeeded on
//! the caller's side, and ranking bookkeeping is never allowed to fail
//! that action retroactively. Failures are logged here instead.

use crate::domain::{NewFeedEntry, ObjectKind, ObjectRef};
use crate::handler::ApiState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize)]
pub struct CommentEvent {
    pub kind: ObjectKind,
    pub id: i64,
    pub commenter_uid: i64,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct LikeEvent {
    pub kind: ObjectKind,
    pub id: i64,
    pub delta: i64,
}

#[derive(Deserialize)]
pub struct CategoryEvent {
    pub kind: ObjectKind,
    pub id: i64,
    pub category_id: i64,
    /// Whether the target category is publicly listed; a hidden category
    /// takes the entry offline.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ObjectEvent {
    pub kind: ObjectKind,
    pub id: i64,
}

/// Handler for POST /v1/feed/publish
pub async fn publish_handler(
    State(state): State<ApiState>,
    Json(event): Json<NewFeedEntry>,
) -> (StatusCode, &'static str) {
    let object = event.object;
    if let Err(e) = state.service.publish(event).await {
        warn!(%object, error = %e, "publish event failed");
    }
    (StatusCode::OK, "OK")
}

/// Handler for POST /v1/feed/comment
pub async fn comment_handler(
    State(state): State<ApiState>,
    Json(event): Json<CommentEvent>,
) -> (StatusCode, &'static str) {
    state
        .service
        .comment_added(ObjectRef::new(event.kind, event.id), event.commenter_uid, event.at)
        .await;
    (StatusCode::OK, "OK")
}

/// Handler for POST /v1/feed/like
pub async fn like_handler(
    State(state): State<ApiState>,
    Json(event): Json<LikeEvent>,
) -> (StatusCode, &'static str) {
    if event.delta != 1 && event.delta != -1 {
        return (StatusCode::BAD_REQUEST, "delta must be +1 or -1");
    }
    state
        .service
        .like_changed(ObjectRef::new(event.kind, event.id), event.delta)
        .await;
    (StatusCode::OK, "OK")
}

/// Handler for POST /v1/feed/category
pub async fn category_handler(
    State(state): State<ApiState>,
    Json(event): Json<CategoryEvent>,
) -> (StatusCode, &'static str) {
    let object = ObjectRef::new(event.kind, event.id);
    if let Err(e) = state
        .service
        .category_reassigned(object, event.category_id, event.visible)
        .await
    {
        warn!(%object, error = %e, "category event failed");
    }
    (StatusCode::OK, "OK")
}

/// Handler for POST /v1/feed/offline
pub async fn offline_handler(
    State(state): State<ApiState>,
    Json(event): Json<ObjectEvent>,
) -> (StatusCode, &'static str) {
    let object = ObjectRef::new(event.kind, event.id);
    if let Err(e) = state.service.take_offline(object).await {
        warn!(%object, error = %e, "offline event failed");
    }
    (StatusCode::OK, "OK")
}
