use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Where a local event stands with respect to Google Calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Stored locally, not pushed yet
    Pending,
    Synced,
    /// Transient failure, `sync_error` has the details
    Failed,
    /// The stored credential is missing or revoked
    NeedsAuth,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::NeedsAuth => "needs_auth",
        }
    }

    /// Whether a re-delivered confirmation should retry the sync.
    pub fn is_resyncable(&self) -> bool {
        matches!(self, SyncStatus::Failed | SyncStatus::NeedsAuth)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            "needs_auth" => Ok(SyncStatus::NeedsAuth),
            other => Err(anyhow!("Unknown sync status: {}", other)),
        }
    }
}

impl ToSql for SyncStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SyncStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub client_ref: Option<i64>,
    pub property_ref: Option<i64>,
    pub confirmation_ref: Option<i64>,
    pub dedupe_key: String,
    pub sync_status: SyncStatus,
    pub external_event_id: Option<String>,
    pub sync_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Values for a row about to be inserted. New rows always start out
/// `pending`.
#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub client_ref: Option<i64>,
    pub property_ref: Option<i64>,
    pub confirmation_ref: Option<i64>,
    pub dedupe_key: String,
}
