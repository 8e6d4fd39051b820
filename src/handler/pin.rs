use crate::domain::{ObjectKind, ObjectRef};
use crate::error::FeedRankError;
use crate::handler::ApiState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::error;

#[derive(Deserialize)]
pub struct PinRequest {
    pub kind: ObjectKind,
    pub id: i64,
    pub acting_uid: i64,
    #[serde(default)]
    pub acting_is_admin: bool,
}

/// Handler for POST /v1/feed/pin
pub async fn pin_handler(
    State(state): State<ApiState>,
    Json(req): Json<PinRequest>,
) -> (StatusCode, &'static str) {
    let object = ObjectRef::new(req.kind, req.id);
    to_status(
        state
            .service
            .pin(object, req.acting_uid, req.acting_is_admin)
            .await,
    )
}

/// Handler for POST /v1/feed/unpin
pub async fn unpin_handler(
    State(state): State<ApiState>,
    Json(req): Json<PinRequest>,
) -> (StatusCode, &'static str) {
    let object = ObjectRef::new(req.kind, req.id);
    to_status(
        state
            .service
            .unpin(object, req.acting_uid, req.acting_is_admin)
            .await,
    )
}

fn to_status(result: Result<(), FeedRankError>) -> (StatusCode, &'static str) {
    match result {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(FeedRankError::NotFound(_)) => (StatusCode::NOT_FOUND, "Not found"),
        Err(FeedRankError::Forbidden { .. }) => (StatusCode::FORBIDDEN, "Forbidden"),
        Err(e) => {
            error!(error = %e, "pin request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Pin failed")
        }
    }
}
