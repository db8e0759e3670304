use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use events::Principal;
use log::*;

pub(crate) struct AuthenticatedPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = RejectionType;

    // Authentication itself happens upstream; this extractor asks the configured resolver who the
    // caller is. The first successful resolution is cached in the request extensions so later
    // extractors (e.g. a handler behind a protect middleware) reuse it. Requests without a
    // principal are rejected with Unauthorized before any handler work is done.
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(AuthenticatedPrincipal(principal.clone()));
        }

        let app_state = AppState::from_ref(state);
        match app_state.principal_resolver.resolve(&parts.headers) {
            Some(principal) => {
                trace!("Resolved principal for user {}", principal.user_id);
                parts.extensions.insert(principal.clone());
                Ok(AuthenticatedPrincipal(principal))
            }
            None => Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string())),
        }
    }
}
