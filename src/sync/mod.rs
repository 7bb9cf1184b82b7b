pub mod db;
pub mod dedupe;
pub mod engine;
pub mod models;

pub use engine::SyncEngineState;
pub use models::{CalendarEvent, SyncStatus};
