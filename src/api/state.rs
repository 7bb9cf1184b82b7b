use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::sync::SyncEngineState;

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    // One engine for every request. Held across awaits so it needs
    // the async mutex.
    pub calendar: Arc<Mutex<SyncEngineState>>,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig, calendar: SyncEngineState) -> Self {
        Self {
            db,
            config,
            calendar: Arc::new(Mutex::new(calendar)),
        }
    }
}
