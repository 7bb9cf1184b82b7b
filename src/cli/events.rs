use anyhow::Result;

use crate::core::db::async_db;
use crate::sync::SyncStatus;
use crate::sync::db::list_events;

pub async fn run(db_path: &str, status: Option<SyncStatus>) -> Result<()> {
    let db = async_db(db_path).await?;
    let events = list_events(&db, status).await?;
    if events.is_empty() {
        println!("No calendar events");
    }
    for event in events {
        println!(
            "{:>5}  {}  {:<10}  {}  @ {}{}",
            event.id,
            event.start_date.format("%Y-%m-%d %H:%M"),
            event.sync_status,
            event.title,
            event.location,
            event
                .sync_error
                .map(|err| format!("\n       {}", err))
                .unwrap_or_default()
        );
    }
    Ok(())
}
