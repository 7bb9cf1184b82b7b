use std::io::{self, Write};

use anyhow::{Result, anyhow};
use reqwest::Client;

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::google::oauth::{
    CALENDAR_SERVICE, authorization_url, exchange_code_for_token, save_refresh_token,
};

pub async fn run(config: &AppConfig) -> Result<()> {
    println!(
        "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
        authorization_url(config)
    );
    print!("Paste the authorization code shown by Google here: ");
    io::stdout().flush()?;
    let mut code = String::new();
    io::stdin().read_line(&mut code)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(anyhow!("No authorization code entered"));
    }

    let client = Client::builder().timeout(config.http_timeout()).build()?;
    let token = exchange_code_for_token(&client, config, code).await?;

    // Store the refresh token in the DB and use that to fetch an access token from now on.
    let refresh_token = token
        .refresh_token
        .ok_or(anyhow!("No refresh token in response"))?;
    let db = async_db(&config.db_path).await?;
    save_refresh_token(&db, CALENDAR_SERVICE, &refresh_token).await?;
    println!("Google Calendar refresh token saved to DB.");

    Ok(())
}
