//! Google OAuth2: consent URL, code exchange, refresh grant and the
//! refresh token store.

use anyhow::{Error, Result};
use reqwest::Client;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use tokio_rusqlite::Connection;

use super::GoogleApiError;
use crate::core::AppConfig;

/// Key of the calendar credential in the `oauth_token` table.
pub const CALENDAR_SERVICE: &str = "google_calendar";

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Consent screen URL. `access_type=offline` and `prompt=consent` make
/// Google hand out a refresh token on every authorization.
pub fn authorization_url(config: &AppConfig) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        config.google_auth_url,
        urlencoding::encode(&config.google_client_id),
        urlencoding::encode(&config.redirect_uri()),
        urlencoding::encode(CALENDAR_SCOPE)
    )
}

pub async fn exchange_code_for_token(
    client: &Client,
    config: &AppConfig,
    code: &str,
) -> Result<OAuthToken, GoogleApiError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    token_request(client, &config.google_token_url, &params).await
}

pub async fn refresh_access_token(
    client: &Client,
    config: &AppConfig,
    refresh_token: &str,
) -> Result<OAuthToken, GoogleApiError> {
    let params = [
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    token_request(client, &config.google_token_url, &params).await
}

async fn token_request(
    client: &Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<OAuthToken, GoogleApiError> {
    let resp = client.post(token_url).form(params).send().await?;
    if !resp.status().is_success() {
        return Err(GoogleApiError::from_response(resp).await);
    }
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

pub async fn find_refresh_token(db: &Connection, service: &str) -> Result<Option<String>, Error> {
    let service = service.to_string();
    let token = db
        .call(move |conn| {
            let token = conn
                .query_row(
                    "SELECT refresh_token FROM oauth_token WHERE service = ?1",
                    [&service],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(token)
        })
        .await?;
    Ok(token)
}

pub async fn save_refresh_token(db: &Connection, service: &str, refresh_token: &str) -> Result<()> {
    let service = service.to_string();
    let refresh_token = refresh_token.to_string();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO oauth_token (service, refresh_token) VALUES (?1, ?2)
             ON CONFLICT(service) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                updated_at = CURRENT_TIMESTAMP",
            (&service, &refresh_token),
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Returns whether a credential was actually removed.
pub async fn delete_refresh_token(db: &Connection, service: &str) -> Result<bool> {
    let service = service.to_string();
    let deleted = db
        .call(move |conn| {
            let n = conn.execute("DELETE FROM oauth_token WHERE service = ?1", [&service])?;
            Ok(n > 0)
        })
        .await?;
    Ok(deleted)
}
