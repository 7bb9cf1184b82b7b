use anyhow::Result;

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::pipeline::{InboundConfirmation, handle_confirmation};
use crate::sync::SyncEngineState;

pub async fn run(
    config: &AppConfig,
    text: String,
    sender: String,
    confirmation_ref: Option<i64>,
) -> Result<()> {
    super::init_tracing();

    let db = async_db(&config.db_path).await?;
    let mut engine = SyncEngineState::initialize(&db, config).await?;
    let msg = InboundConfirmation {
        text,
        sender,
        confirmation_ref,
        ..Default::default()
    };

    match handle_confirmation(&db, &mut engine, config, &msg).await? {
        Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
        None => println!("Not an appointment confirmation, nothing stored"),
    }
    Ok(())
}
