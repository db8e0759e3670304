use events::EventBus;
use log::{error, info};
use service::{auth::TrustedHeaderResolver, config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Starting up [{}]...", config.runtime_env());

    let principal_resolver = match TrustedHeaderResolver::from_config(&config) {
        Ok(resolver) => Arc::new(resolver),
        Err(e) => {
            error!("Invalid identity header configuration: {e}");
            std::process::exit(1);
        }
    };

    let event_bus = EventBus::with_max_listeners(config.max_listeners);
    let app_state = AppState::new(config, event_bus, principal_resolver);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }

    info!("Server stopped");
}
