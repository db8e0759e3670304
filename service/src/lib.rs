use auth::PrincipalResolver;
use config::Config;
use events::EventBus;
use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub event_bus: EventBus,
    pub sse_manager: Arc<sse::Manager>,
    pub principal_resolver: Arc<dyn PrincipalResolver>,
}

impl AppState {
    /// Builds the state around the process-wide event bus. The live
    /// connection manager is created on the same bus.
    pub fn new(
        app_config: Config,
        event_bus: EventBus,
        principal_resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        let sse_manager = Arc::new(sse::Manager::with_heartbeat_interval(
            event_bus.clone(),
            app_config.heartbeat_interval(),
        ));

        Self {
            config: app_config,
            event_bus,
            sse_manager,
            principal_resolver,
        }
    }
}
