use axum::http::{header, HeaderValue, Method};
use log::*;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod extractors;
mod protect;
mod router;
mod sse;

pub use error::Error;
pub use router::define_routes;
pub use service::AppState;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    info!(
        "Server starting... listening for connections on http://{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );

    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let listen_addr = format!("{host}:{port}");
    let listener = TcpListener::bind(listen_addr).await?;

    let cors_layer = cors_layer(&app_state.config.allowed_origins);
    let sse_manager = Arc::clone(&app_state.sse_manager);

    axum::serve(listener, router::define_routes(app_state).layer(cors_layer))
        .with_graceful_shutdown(shutdown_signal(sse_manager))
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| {
            let wildcard = origin.trim() == "*";
            if wildcard {
                warn!("Ignoring wildcard allowed origin, credentials require explicit origins");
            }
            !wildcard
        })
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid allowed origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_origin(origins)
}

// Open live streams never finish on their own, so they are told to close
// before axum waits for in-flight responses to drain.
async fn shutdown_signal(sse_manager: Arc<::sse::Manager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    let closed = sse_manager.close_all();
    info!("Shutdown requested, closed {closed} live connection(s)");
}
