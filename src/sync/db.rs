//! Local calendar event store

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension, Row, params};
use tokio_rusqlite::Connection;

use super::models::{CalendarEvent, NewCalendarEvent, SyncStatus};

const EVENT_COLUMNS: &str = "id, title, description, location, start_date, end_date, \
    client_ref, property_ref, confirmation_ref, dedupe_key, sync_status, \
    external_event_id, sync_error, last_sync_at, created_at, updated_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        client_ref: row.get(6)?,
        property_ref: row.get(7)?,
        confirmation_ref: row.get(8)?,
        dedupe_key: row.get(9)?,
        sync_status: row.get(10)?,
        external_event_id: row.get(11)?,
        sync_error: row.get(12)?,
        last_sync_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn select_event(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<CalendarEvent>> {
    conn.query_row(
        &format!("SELECT {} FROM calendar_event WHERE id = ?1", EVENT_COLUMNS),
        [id],
        event_from_row,
    )
    .optional()
}

/// Insert a `pending` event. Returns `None` when another row already
/// holds the same dedupe key or confirmation ref.
pub async fn insert_event(
    db: &Connection,
    event: NewCalendarEvent,
) -> Result<Option<CalendarEvent>, Error> {
    let inserted = db
        .call(move |conn| {
            let result = conn.execute(
                "INSERT INTO calendar_event (
                    title, description, location, start_date, end_date,
                    client_ref, property_ref, confirmation_ref, dedupe_key, sync_status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.title,
                    event.description,
                    event.location,
                    event.start_date,
                    event.end_date,
                    event.client_ref,
                    event.property_ref,
                    event.confirmation_ref,
                    event.dedupe_key,
                    SyncStatus::Pending,
                ],
            );
            match result {
                Ok(_) => Ok(select_event(conn, conn.last_insert_rowid())?),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(err) => Err(err.into()),
            }
        })
        .await?;
    Ok(inserted)
}

pub async fn find_event(db: &Connection, id: i64) -> Result<Option<CalendarEvent>, Error> {
    Ok(db.call(move |conn| Ok(select_event(conn, id)?)).await?)
}

pub async fn find_event_by_confirmation_ref(
    db: &Connection,
    confirmation_ref: i64,
) -> Result<Option<CalendarEvent>, Error> {
    let event = db
        .call(move |conn| {
            let event = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM calendar_event WHERE confirmation_ref = ?1",
                        EVENT_COLUMNS
                    ),
                    [confirmation_ref],
                    event_from_row,
                )
                .optional()?;
            Ok(event)
        })
        .await?;
    Ok(event)
}

pub async fn find_event_by_dedupe_key(
    db: &Connection,
    dedupe_key: &str,
) -> Result<Option<CalendarEvent>, Error> {
    let dedupe_key = dedupe_key.to_string();
    let event = db
        .call(move |conn| {
            let event = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM calendar_event WHERE dedupe_key = ?1",
                        EVENT_COLUMNS
                    ),
                    [&dedupe_key],
                    event_from_row,
                )
                .optional()?;
            Ok(event)
        })
        .await?;
    Ok(event)
}

/// The row for the same logical appointment, matched on the upstream
/// confirmation ref first and the content key second.
pub async fn find_existing_event(
    db: &Connection,
    confirmation_ref: Option<i64>,
    dedupe_key: &str,
) -> Result<Option<CalendarEvent>, Error> {
    if let Some(confirmation_ref) = confirmation_ref
        && let Some(event) = find_event_by_confirmation_ref(db, confirmation_ref).await?
    {
        return Ok(Some(event));
    }
    find_event_by_dedupe_key(db, dedupe_key).await
}

/// Events ordered newest first, optionally restricted to one status.
pub async fn list_events(
    db: &Connection,
    status: Option<SyncStatus>,
) -> Result<Vec<CalendarEvent>, Error> {
    let events = db
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM calendar_event
                 WHERE (?1 IS NULL OR sync_status = ?1)
                 ORDER BY start_date DESC, id DESC",
                EVENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([status], event_from_row)?
                .collect::<Result<Vec<CalendarEvent>, _>>()?;
            Ok(rows)
        })
        .await?;
    Ok(events)
}

pub async fn mark_synced(
    db: &Connection,
    id: i64,
    external_event_id: &str,
) -> Result<CalendarEvent, Error> {
    update_sync_state(
        db,
        id,
        SyncStatus::Synced,
        Some(external_event_id.to_string()),
        None,
    )
    .await
}

pub async fn mark_failed(db: &Connection, id: i64, error: &str) -> Result<CalendarEvent, Error> {
    update_sync_state(db, id, SyncStatus::Failed, None, Some(error.to_string())).await
}

pub async fn mark_needs_auth(
    db: &Connection,
    id: i64,
    error: &str,
) -> Result<CalendarEvent, Error> {
    update_sync_state(db, id, SyncStatus::NeedsAuth, None, Some(error.to_string())).await
}

/// A missing `external_event_id` keeps whatever id the row already has
/// so a failed update doesn't orphan the remote event. `last_sync_at`
/// only moves when the event reaches Google Calendar.
async fn update_sync_state(
    db: &Connection,
    id: i64,
    status: SyncStatus,
    external_event_id: Option<String>,
    sync_error: Option<String>,
) -> Result<CalendarEvent, Error> {
    let synced_at = (status == SyncStatus::Synced).then(Utc::now);
    let event = db
        .call(move |conn| {
            conn.execute(
                "UPDATE calendar_event SET
                    sync_status = ?2,
                    external_event_id = COALESCE(?3, external_event_id),
                    sync_error = ?4,
                    last_sync_at = COALESCE(?5, last_sync_at),
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1",
                params![id, status, external_event_id, sync_error, synced_at],
            )?;
            Ok(select_event(conn, id)?)
        })
        .await?;
    event.ok_or_else(|| anyhow!("Calendar event {} not found", id))
}
