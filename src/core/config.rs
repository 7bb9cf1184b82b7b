use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;

pub const DEFAULT_GOOGLE_API_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

pub fn storage_path_from_env() -> String {
    env::var("AGENDA_STORAGE_PATH").unwrap_or("./".to_string())
}

/// Database directory. Commands that only touch local storage read
/// this instead of the full config so they work without Google
/// credentials.
pub fn db_path_from_env() -> String {
    format!("{}/db", storage_path_from_env())
}

pub fn timezone_from_env() -> Result<Tz> {
    env::var("AGENDA_TIMEZONE")
        .unwrap_or_else(|_| "Europe/Rome".to_string())
        .parse::<Tz>()
        .map_err(|e| anyhow!("Invalid AGENDA_TIMEZONE: {}", e))
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_api_url: String,
    pub google_token_url: String,
    pub google_auth_url: String,
    pub public_hostname: String,
    pub calendar_id: String,
    pub timezone: Tz,
    pub appointment_minutes: i64,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Build the config from `AGENDA_*` environment variables. Only the
    /// Google client credentials are required.
    pub fn from_env() -> Result<Self> {
        let storage_path = storage_path_from_env();
        let db_path = db_path_from_env();
        let google_client_id =
            env::var("AGENDA_GOOGLE_CLIENT_ID").context("Missing env var AGENDA_GOOGLE_CLIENT_ID")?;
        let google_client_secret = env::var("AGENDA_GOOGLE_CLIENT_SECRET")
            .context("Missing env var AGENDA_GOOGLE_CLIENT_SECRET")?;
        let google_api_url = env::var("AGENDA_GOOGLE_API_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_API_URL.to_string());
        let google_token_url = env::var("AGENDA_GOOGLE_TOKEN_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_TOKEN_URL.to_string());
        let google_auth_url = env::var("AGENDA_GOOGLE_AUTH_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_AUTH_URL.to_string());
        let public_hostname =
            env::var("AGENDA_PUBLIC_HOSTNAME").unwrap_or_else(|_| "localhost:2222".to_string());
        let calendar_id = env::var("AGENDA_CALENDAR_ID").unwrap_or_else(|_| "primary".to_string());
        let timezone = timezone_from_env()?;
        let appointment_minutes = env::var("AGENDA_APPOINTMENT_MINUTES")
            .ok()
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("Invalid AGENDA_APPOINTMENT_MINUTES")?
            .unwrap_or(60);
        let http_timeout_secs = env::var("AGENDA_HTTP_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("Invalid AGENDA_HTTP_TIMEOUT_SECS")?
            .unwrap_or(15);

        Ok(Self {
            storage_path,
            db_path,
            google_client_id,
            google_client_secret,
            google_api_url,
            google_token_url,
            google_auth_url,
            public_hostname,
            calendar_id,
            timezone,
            appointment_minutes,
            http_timeout_secs,
        })
    }

    /// OAuth redirect URI registered with Google for this deployment.
    pub fn redirect_uri(&self) -> String {
        let scheme = if self.public_hostname.starts_with("localhost")
            || self.public_hostname.starts_with("127.0.0.1")
        {
            "http"
        } else {
            "https"
        };
        format!(
            "{}://{}/api/auth/google/callback",
            scheme, self.public_hostname
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
pub(crate) fn test_config(google_url: &str) -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        db_path: String::from("./db"),
        google_client_id: String::from("test_client_id"),
        google_client_secret: String::from("test_client_secret"),
        google_api_url: google_url.to_string(),
        google_token_url: format!("{}/token", google_url),
        google_auth_url: format!("{}/auth", google_url),
        public_hostname: String::from("crm.example.it"),
        calendar_id: String::from("primary"),
        timezone: chrono_tz::Europe::Rome,
        appointment_minutes: 60,
        http_timeout_secs: 5,
    }
}
