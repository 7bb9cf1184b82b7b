use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod confirm;
pub mod events;
pub mod init;
pub mod migrate;
pub mod parse;
pub mod resync;
pub mod serve;

use crate::core::AppConfig;
use crate::core::config::{db_path_from_env, timezone_from_env};
use crate::sync::SyncStatus;

#[derive(Subcommand)]
enum Command {
    /// Initialize the db
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Migrate the db schema
    Migrate {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Authorize Google Calendar access and store the refresh token
    Auth {},
    /// Parse a message without storing anything
    Parse {
        #[arg(long)]
        text: String,
        #[arg(long)]
        sender: String,
    },
    /// Run a confirmation message through the whole pipeline
    Confirm {
        #[arg(long)]
        text: String,
        #[arg(long)]
        sender: String,
        #[arg(long)]
        confirmation_ref: Option<i64>,
    },
    /// List stored calendar events
    Events {
        #[arg(long)]
        status: Option<SyncStatus>,
    },
    /// Retry syncing one event or every event in a status
    Resync {
        #[arg(long, conflicts_with = "status")]
        id: Option<i64>,
        #[arg(long)]
        status: Option<SyncStatus>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Log to stdout for one-shot commands
pub(crate) fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &db_path_from_env()).await?;
        }
        Some(Command::Migrate { db }) => {
            migrate::run(db, &db_path_from_env()).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Auth {}) => {
            auth::run(&AppConfig::from_env()?).await?;
        }
        Some(Command::Parse { text, sender }) => {
            parse::run(&text, &sender, timezone_from_env()?)?;
        }
        Some(Command::Confirm {
            text,
            sender,
            confirmation_ref,
        }) => {
            confirm::run(&AppConfig::from_env()?, text, sender, confirmation_ref).await?;
        }
        Some(Command::Events { status }) => {
            events::run(&db_path_from_env(), status).await?;
        }
        Some(Command::Resync { id, status }) => {
            resync::run(&AppConfig::from_env()?, id, status).await?;
        }
        None => {}
    }

    Ok(())
}
