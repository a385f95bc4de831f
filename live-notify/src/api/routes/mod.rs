//! API route modules.
//!
//! Organizes routes by resource type.

pub mod health;
pub mod rooms;
pub mod subscriptions;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/subscriptions", subscriptions::router())
        .nest("/api/rooms", rooms::router())
        .nest("/health", health::router())
        .with_state(state)
}
