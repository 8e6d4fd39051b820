use crate::domain::{ObjectKind, ObjectRef, VisitorIdentity};
use crate::handler::ApiState;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

#[derive(Deserialize)]
pub struct ViewRequest {
    pub kind: ObjectKind,
    pub id: i64,
    pub uid: Option<i64>,
}

/// Handler for POST /v1/feed/view, a fire-and-forget page view.
///
/// Known crawlers are dropped here, before the counter; the counter stays
/// correct if one slips through, it just inflates the count.
pub async fn view_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ViewRequest>,
) -> StatusCode {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state
        .spider_agents
        .iter()
        .any(|spider| user_agent.contains(spider.as_str()))
    {
        debug!(user_agent, "dropping crawler view");
        return StatusCode::ACCEPTED;
    }

    let visitor = VisitorIdentity::from_parts(req.uid, client_addr(&headers));
    state
        .service
        .record_view(ObjectRef::new(req.kind, req.id), visitor);
    StatusCode::ACCEPTED
}

/// Client address from `x-forwarded-for` (the site's edge sits in front of
/// this service). Unparsable or absent addresses collapse into one bucket.
fn client_addr(headers: &HeaderMap) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_addr(&headers), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn missing_header_falls_back_to_unspecified() {
        let headers = HeaderMap::new();
        assert_eq!(client_addr(&headers), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn garbage_header_falls_back_to_unspecified() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_addr(&headers), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
