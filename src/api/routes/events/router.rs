//! Router for the calendar events API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;

use super::public;
use crate::api::state::AppState;
use crate::pipeline::resync_event;
use crate::sync::db::{find_event, list_events};

type SharedState = Arc<RwLock<AppState>>;

fn not_found(id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("Calendar event {} not found", id),
    )
        .into_response()
}

/// List events, newest first
async fn events_list(
    State(state): State<SharedState>,
    Query(params): Query<public::EventsQuery>,
) -> Result<Json<Vec<public::CalendarEvent>>, crate::api::public::ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let events = list_events(&db, params.status).await?;
    Ok(Json(events))
}

/// Get a single event by ID
async fn event_detail(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Response, crate::api::public::ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let resp = match find_event(&db, id).await? {
        Some(event) => Json(event).into_response(),
        None => not_found(id),
    };
    Ok(resp)
}

/// Retry pushing an event to Google Calendar
async fn event_resync(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Response, crate::api::public::ApiError> {
    let (db, calendar) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), Arc::clone(&shared_state.calendar))
    };

    let mut engine = calendar.lock().await;
    let resp = match resync_event(&db, &mut engine, id).await? {
        Some(event) => Json(event).into_response(),
        None => not_found(id),
    };
    Ok(resp)
}

/// Create the events router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", axum::routing::get(events_list))
        .route("/{id}", axum::routing::get(event_detail))
        .route("/{id}/resync", axum::routing::post(event_resync))
}
