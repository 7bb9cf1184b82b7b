//! API routes module

pub mod auth;
pub mod events;
pub mod webhook;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Inbound confirmations
        .nest("/webhook", webhook::router())
        // Stored calendar events
        .nest("/events", events::router())
        // Google Calendar authorization
        .nest("/auth", auth::router())
}
