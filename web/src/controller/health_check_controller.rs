use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET liveness probe for the HTTP server itself (not for any live connection)
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
