//! Public types for the events API
use serde::Deserialize;

use crate::sync::SyncStatus;

pub use crate::sync::CalendarEvent;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub status: Option<SyncStatus>,
}
