use crate::extractors::authenticated_principal::AuthenticatedPrincipal;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use events::Role;
use log::*;

/// Checks that the authenticated principal holds the ADMIN role.
/// Intended to be given to axum::middleware::from_fn_with_state in the router
pub(crate) async fn require_admin(
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    request: Request,
    next: Next,
) -> Response {
    if principal.role == Some(Role::Admin) {
        next.run(request).await
    } else {
        debug!(
            "User {} ({:?}) denied access to {}",
            principal.user_id,
            principal.role,
            request.uri().path()
        );
        (StatusCode::FORBIDDEN, "FORBIDDEN").into_response()
    }
}
