pub mod config;
pub mod coordinator;
pub mod error;
pub mod external;
pub mod registry;
pub mod results;
pub mod state;
pub mod store;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    build_router(state)
}

/// Router construction split out so tests can inject collaborators through
/// `AppState::with_collaborators`.
pub fn build_router(state: AppState) -> (Router<()>, AppState) {
    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());
    (app, state)
}

/// Background task that periodically destroys rooms with no activity.
pub fn spawn_idle_sweeper(state: AppState) {
    let check_interval = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
    let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check_interval);
        loop {
            ticker.tick().await;
            let swept = state.coordinator.sweep_idle_rooms(max_idle).await;
            if swept > 0 {
                tracing::info!(swept, "Idle rooms destroyed");
            }
        }
    });
}
