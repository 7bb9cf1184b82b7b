//! Router for the Google Calendar authorization flow

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Query;
use reqwest::Client;

use super::public;
use crate::api::state::AppState;
use crate::google::oauth::{
    CALENDAR_SERVICE, authorization_url, exchange_code_for_token, save_refresh_token,
};

type SharedState = Arc<RwLock<AppState>>;

/// Whether the server currently holds a usable credential
async fn auth_status(
    State(state): State<SharedState>,
) -> Result<Json<public::AuthStatusResponse>, crate::api::public::ApiError> {
    let calendar = Arc::clone(&state.read().expect("Unable to read share state").calendar);
    let configured = calendar.lock().await.is_configured();
    Ok(Json(public::AuthStatusResponse { configured }))
}

/// Send the user to the Google consent screen
async fn auth_start(State(state): State<SharedState>) -> Redirect {
    let url = authorization_url(&state.read().expect("Unable to read share state").config);
    Redirect::temporary(&url)
}

/// Google redirects here after consent. Stores the refresh token and
/// re-enables syncing.
async fn auth_callback(
    State(state): State<SharedState>,
    Query(params): Query<public::CallbackQuery>,
) -> Result<Response, crate::api::public::ApiError> {
    if let Some(error) = params.error {
        tracing::warn!("Google authorization was not granted: {}", error);
        return Ok((
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {}", error),
        )
            .into_response());
    }
    let Some(code) = params.code else {
        return Ok((StatusCode::BAD_REQUEST, "Missing authorization code").into_response());
    };

    let (db, config, calendar) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.db.clone(),
            shared_state.config.clone(),
            Arc::clone(&shared_state.calendar),
        )
    };

    let client = Client::builder().timeout(config.http_timeout()).build()?;
    let token = exchange_code_for_token(&client, &config, &code).await?;
    let refresh_token = token
        .refresh_token
        .ok_or(anyhow!("No refresh token in response"))?;
    save_refresh_token(&db, CALENDAR_SERVICE, &refresh_token).await?;

    calendar.lock().await.reinitialize(&db, &config).await?;
    tracing::info!("Google Calendar authorized");

    Ok((StatusCode::OK, "Google Calendar authorized").into_response())
}

/// Create the auth router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/status", axum::routing::get(auth_status))
        .route("/google", axum::routing::get(auth_start))
        .route("/google/callback", axum::routing::get(auth_callback))
}
