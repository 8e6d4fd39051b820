/// Handler for GET /v1/health
pub async fn health_handler() -> &'static str {
    "OK"
}
