use crate::extractors::authenticated_principal::AuthenticatedPrincipal;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL, CONNECTION};
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use log::*;
use service::AppState;
use ::sse::message;

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// SSE handler that establishes a long-lived connection for real-time updates.
/// Unauthenticated callers are rejected by the extractor before any connection
/// state exists. The stream itself carries its own heartbeat frames.
pub(crate) async fn live_handler(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    debug!("Establishing live connection for user {}", principal.user_id);

    let connection = app_state.sse_manager.connect(principal);

    (
        [
            (CACHE_CONTROL, message::CACHE_CONTROL),
            (CONNECTION, "keep-alive"),
            // Stop nginx from buffering the stream
            (X_ACCEL_BUFFERING.clone(), "no"),
        ],
        Sse::new(connection.into_sse_stream()),
    )
}
