//! Confirmation message to calendar event, exactly once.
//!
//! A confirmation can be delivered more than once (webhook retries,
//! the client writing twice). Every delivery of the same appointment
//! lands on the same `calendar_event` row: lookups go through the
//! upstream confirmation ref and the content dedupe key, and the
//! store's unique indexes catch whatever slips between lookup and
//! insert.

use anyhow::{Result, anyhow};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::parse::{self, AppointmentData};
use crate::sync::SyncEngineState;
use crate::sync::db::{find_event, find_existing_event, insert_event, list_events};
use crate::sync::dedupe::derive_key;
use crate::sync::models::{CalendarEvent, NewCalendarEvent, SyncStatus};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InboundConfirmation {
    pub text: String,
    pub sender: String,
    /// Id of the confirmation record upstream, when there is one
    pub confirmation_ref: Option<i64>,
    pub client_ref: Option<i64>,
    pub property_ref: Option<i64>,
}

pub fn appointment_title(data: &AppointmentData) -> String {
    format!("Appuntamento {}", data.client_name)
}

pub fn appointment_description(data: &AppointmentData) -> String {
    format!(
        "Cliente: {} {}\nTelefono: {}",
        data.salutation, data.client_name, data.phone
    )
}

/// Handle one inbound message using today's date in the calendar
/// timezone.
pub async fn handle_confirmation(
    db: &Connection,
    engine: &mut SyncEngineState,
    config: &AppConfig,
    msg: &InboundConfirmation,
) -> Result<Option<CalendarEvent>> {
    let today = Utc::now().with_timezone(&config.timezone).date_naive();
    handle_confirmation_on(db, engine, config, msg, today).await
}

/// Parse the message and make sure exactly one event exists for it.
///
/// Returns `None` when the message is not an appointment confirmation.
/// Sync failures are recorded on the returned row; an `Err` means the
/// local store failed.
pub async fn handle_confirmation_on(
    db: &Connection,
    engine: &mut SyncEngineState,
    config: &AppConfig,
    msg: &InboundConfirmation,
    today: NaiveDate,
) -> Result<Option<CalendarEvent>> {
    let Some(data) = parse::extract(&msg.text, &msg.sender, today) else {
        return Ok(None);
    };

    let title = appointment_title(&data);
    let start_date = data.appointment_start;
    let end_date = start_date + Duration::minutes(config.appointment_minutes);
    let dedupe_key = derive_key(&title, start_date, &data.address);

    if let Some(existing) = find_existing_event(db, msg.confirmation_ref, &dedupe_key).await? {
        tracing::info!(
            "Confirmation matches calendar event {} ({})",
            existing.id,
            existing.sync_status
        );
        return Ok(Some(resync_if_needed(db, engine, existing).await?));
    }

    let new_event = NewCalendarEvent {
        title,
        description: appointment_description(&data),
        location: data.address,
        start_date,
        end_date,
        client_ref: msg.client_ref,
        property_ref: msg.property_ref,
        confirmation_ref: msg.confirmation_ref,
        dedupe_key: dedupe_key.clone(),
    };

    match insert_event(db, new_event).await? {
        Some(event) => {
            tracing::info!(
                "Created calendar event {} for {} at {}",
                event.id,
                data.client_name,
                event.start_date
            );
            Ok(Some(engine.sync_event(db, event).await?))
        }
        None => {
            // Lost the race against a concurrent delivery
            let existing = find_existing_event(db, msg.confirmation_ref, &dedupe_key)
                .await?
                .ok_or_else(|| {
                    anyhow!("Insert rejected as duplicate but no matching calendar event found")
                })?;
            tracing::info!("Concurrent delivery already created calendar event {}", existing.id);
            Ok(Some(resync_if_needed(db, engine, existing).await?))
        }
    }
}

async fn resync_if_needed(
    db: &Connection,
    engine: &mut SyncEngineState,
    event: CalendarEvent,
) -> Result<CalendarEvent> {
    if event.sync_status.is_resyncable() {
        tracing::info!("Resyncing calendar event {}", event.id);
        engine.sync_event(db, event).await
    } else {
        Ok(event)
    }
}

/// Operator triggered retry of one row. Rows already synced are
/// returned as they are.
pub async fn resync_event(
    db: &Connection,
    engine: &mut SyncEngineState,
    id: i64,
) -> Result<Option<CalendarEvent>> {
    let Some(event) = find_event(db, id).await? else {
        return Ok(None);
    };
    if event.sync_status == SyncStatus::Synced {
        return Ok(Some(event));
    }
    Ok(Some(engine.sync_event(db, event).await?))
}

/// Retry every row currently in `status`.
pub async fn resync_by_status(
    db: &Connection,
    engine: &mut SyncEngineState,
    status: SyncStatus,
) -> Result<Vec<CalendarEvent>> {
    if status == SyncStatus::Synced {
        return Ok(Vec::new());
    }
    let mut results = Vec::new();
    for event in list_events(db, Some(status)).await? {
        results.push(engine.sync_event(db, event).await?);
    }
    Ok(results)
}
