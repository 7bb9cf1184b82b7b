use anyhow::{Result, anyhow};

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::pipeline::{resync_by_status, resync_event};
use crate::sync::{SyncEngineState, SyncStatus};

pub async fn run(config: &AppConfig, id: Option<i64>, status: Option<SyncStatus>) -> Result<()> {
    super::init_tracing();

    let db = async_db(&config.db_path).await?;
    let mut engine = SyncEngineState::initialize(&db, config).await?;

    let events = match (id, status) {
        (Some(id), _) => {
            let event = resync_event(&db, &mut engine, id)
                .await?
                .ok_or_else(|| anyhow!("Calendar event {} not found", id))?;
            vec![event]
        }
        (None, Some(status)) => resync_by_status(&db, &mut engine, status).await?,
        (None, None) => return Err(anyhow!("Missing value for resync \"--id\" or \"--status\"")),
    };

    for event in events {
        println!("{:>5}  {}", event.id, event.sync_status);
    }
    Ok(())
}
