use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::controller::ApiResponse;
use crate::extractors::authenticated_principal::AuthenticatedPrincipal;
use crate::error::{Error, Result};
use crate::AppState;
use events::EventDraft;
use log::*;

/// POST publish an event onto the live bus.
///
/// The body is `{ "type", "payload", "target" }`; the payload is checked
/// against the shape its type requires. Intended for back-office tooling and
/// producers living outside this process.
pub async fn publish(
    State(app_state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse> {
    let draft = EventDraft::from_json(body)?;
    let event_type = draft.event_type();

    if event_type.is_transport() {
        return Err(Error::ReservedEventType(event_type));
    }

    let event = app_state.event_bus.publish(draft)?;

    info!(
        "User {} published {} event {}",
        principal.user_id,
        event_type,
        event.event_id()
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), event)),
    ))
}

/// GET counts of open live connections and bus listeners
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    let stats = app_state.sse_manager.stats();

    Json(ApiResponse::new(
        StatusCode::OK.into(),
        json!({
            "connections": stats.connections,
            "users": stats.users,
            "listeners": stats.listeners,
        }),
    ))
}
