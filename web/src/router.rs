use crate::{
    controller::{event_controller, health_check_controller},
    protect,
    sse::handler::live_handler,
    AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(live_routes(app_state.clone()))
        .merge(event_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn live_routes(app_state: AppState) -> Router {
    Router::new()
        // GET /live (any authenticated user)
        .route("/live", get(live_handler))
        .merge(
            // GET /live/stats
            Router::new()
                .route("/live/stats", get(event_controller::stats))
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    protect::admin::require_admin,
                )),
        )
        .with_state(app_state)
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", post(event_controller::publish))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            protect::admin::require_admin,
        ))
        .with_state(app_state)
}
