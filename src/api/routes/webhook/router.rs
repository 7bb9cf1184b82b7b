//! Router for the webhook API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::public::ConfirmationRequest;
use crate::api::state::AppState;
use crate::pipeline::handle_confirmation;

type SharedState = Arc<RwLock<AppState>>;

/// Inbound confirmation message from the messaging channel. Messages
/// that aren't appointment confirmations are acknowledged with no
/// content so the sender doesn't retry them.
async fn confirmation_webhook(
    State(state): State<SharedState>,
    Json(msg): Json<ConfirmationRequest>,
) -> Result<Response, crate::api::public::ApiError> {
    let (db, config, calendar) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.db.clone(),
            shared_state.config.clone(),
            Arc::clone(&shared_state.calendar),
        )
    };
    tracing::debug!("Received confirmation from {}", msg.sender);

    let mut engine = calendar.lock().await;
    let resp = match handle_confirmation(&db, &mut engine, &config, &msg).await? {
        Some(event) => Json(event).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(resp)
}

/// Create the webhook router
pub fn router() -> Router<SharedState> {
    Router::new().route("/confirmation", axum::routing::post(confirmation_webhook))
}
