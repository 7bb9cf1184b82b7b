//! Pushes local events to Google Calendar and drives their sync state.
//!
//! The engine is an explicit [`SyncEngineState`] value that callers
//! own and pass by `&mut`. A revoked credential flips it to
//! `Unconfigured` for every later call until it is reinitialized after
//! the user authorizes again.

use anyhow::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use tokio_rusqlite::Connection;

use super::db::{mark_failed, mark_needs_auth, mark_synced};
use super::models::CalendarEvent;
use crate::core::AppConfig;
use crate::google::GoogleApiError;
use crate::google::gcal::{EventPayload, insert_event, update_event};
use crate::google::oauth::{
    CALENDAR_SERVICE, delete_refresh_token, find_refresh_token, refresh_access_token,
};

pub const NOT_AUTHORIZED: &str = "Google Calendar is not authorized";

/// Refresh the access token this long before Google says it expires.
const ACCESS_TOKEN_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Authorized Google Calendar client for the configured calendar.
#[derive(Debug)]
pub struct CalendarClient {
    http: Client,
    config: AppConfig,
    refresh_token: String,
    access_token: Option<AccessToken>,
}

impl CalendarClient {
    pub fn new(config: &AppConfig, refresh_token: &str) -> Result<Self, Error> {
        let http = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            http,
            config: config.clone(),
            refresh_token: refresh_token.to_string(),
            access_token: None,
        })
    }

    async fn access_token(&mut self) -> Result<String, GoogleApiError> {
        if let Some(cached) = &self.access_token
            && cached.expires_at > Utc::now()
        {
            return Ok(cached.token.clone());
        }

        let oauth = refresh_access_token(&self.http, &self.config, &self.refresh_token).await?;
        let lifetime = oauth.expires_in.unwrap_or(3600) - ACCESS_TOKEN_MARGIN_SECS;
        self.access_token = Some(AccessToken {
            token: oauth.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime.max(0)),
        });
        Ok(oauth.access_token)
    }

    /// Create the remote event, or update it when the row already has
    /// one. Returns the remote event id.
    pub async fn push_event(&mut self, event: &CalendarEvent) -> Result<String, GoogleApiError> {
        let token = self.access_token().await?;
        let payload = EventPayload::from_event(event, self.config.timezone);
        let AppConfig {
            google_api_url,
            calendar_id,
            ..
        } = &self.config;

        if let Some(external_id) = &event.external_event_id {
            match update_event(
                &self.http,
                google_api_url,
                &token,
                calendar_id,
                external_id,
                &payload,
            )
            .await
            {
                Ok(remote) => return Ok(remote.id),
                Err(err)
                    if matches!(err.status(), Some(StatusCode::NOT_FOUND | StatusCode::GONE)) =>
                {
                    tracing::warn!(
                        "Remote event {} for calendar event {} is gone, creating a new one",
                        external_id,
                        event.id
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let remote = insert_event(&self.http, google_api_url, &token, calendar_id, &payload).await?;
        Ok(remote.id)
    }

    fn forget_access_token(&mut self) {
        self.access_token = None;
    }
}

#[derive(Debug)]
pub enum SyncEngineState {
    /// No credential stored; every sync ends in `needs_auth` without
    /// touching the network.
    Unconfigured,
    Configured(CalendarClient),
}

impl SyncEngineState {
    /// Load the stored refresh token, if any.
    pub async fn initialize(db: &Connection, config: &AppConfig) -> Result<Self, Error> {
        match find_refresh_token(db, CALENDAR_SERVICE).await? {
            Some(refresh_token) => {
                tracing::info!("Google Calendar credential loaded");
                Ok(Self::Configured(CalendarClient::new(config, &refresh_token)?))
            }
            None => {
                tracing::warn!("No Google Calendar credential, sync disabled until authorized");
                Ok(Self::Unconfigured)
            }
        }
    }

    /// Reload the credential after an authorization flow stored a new one.
    pub async fn reinitialize(&mut self, db: &Connection, config: &AppConfig) -> Result<()> {
        *self = Self::initialize(db, config).await?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    /// Push `event` to Google and record the outcome on the row.
    ///
    /// Sync failures end up in the row's status, never in the returned
    /// error, which is reserved for the local database failing.
    pub async fn sync_event(
        &mut self,
        db: &Connection,
        event: CalendarEvent,
    ) -> Result<CalendarEvent, Error> {
        let client = match self {
            Self::Unconfigured => {
                tracing::info!(
                    "Calendar event {} not synced, Google Calendar is not authorized",
                    event.id
                );
                return mark_needs_auth(db, event.id, NOT_AUTHORIZED).await;
            }
            Self::Configured(client) => client,
        };

        match client.push_event(&event).await {
            Ok(external_id) => {
                tracing::info!("Calendar event {} synced as {}", event.id, external_id);
                mark_synced(db, event.id, &external_id).await
            }
            Err(err) if err.is_invalid_grant() => {
                tracing::warn!(
                    "Google Calendar credential revoked, reauthorization required: {}",
                    err
                );
                delete_refresh_token(db, CALENDAR_SERVICE).await?;
                *self = Self::Unconfigured;
                mark_needs_auth(db, event.id, &err.to_string()).await
            }
            Err(err) => {
                if err.status() == Some(StatusCode::UNAUTHORIZED) {
                    client.forget_access_token();
                }
                tracing::warn!("Calendar event {} failed to sync: {}", event.id, err);
                mark_failed(db, event.id, &err.to_string()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;
    use crate::core::config::test_config;
    use crate::core::db::memory_db;
    use crate::google::oauth::save_refresh_token;
    use crate::sync::db::insert_event as insert_local_event;
    use crate::sync::db::tests::new_event;
    use crate::sync::models::SyncStatus;

    const TOKEN_OK: &str =
        r#"{"access_token": "access-xyz", "expires_in": 3599, "token_type": "Bearer"}"#;
    const INVALID_GRANT: &str =
        r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;

    async fn pending_event(db: &Connection) -> CalendarEvent {
        insert_local_event(db, new_event("Appuntamento Rossi", None))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_without_credential() {
        let db = memory_db().await.unwrap();
        let state = SyncEngineState::initialize(&db, &test_config("http://localhost"))
            .await
            .unwrap();
        assert!(!state.is_configured());
    }

    #[tokio::test]
    async fn test_initialize_with_credential() {
        let db = memory_db().await.unwrap();
        save_refresh_token(&db, CALENDAR_SERVICE, "refresh-abc")
            .await
            .unwrap();
        let state = SyncEngineState::initialize(&db, &test_config("http://localhost"))
            .await
            .unwrap();
        assert!(state.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_needs_auth_without_network() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;
        let insert = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        let event = pending_event(&db).await;
        let mut state = SyncEngineState::Unconfigured;
        let event = state.sync_event(&db, event).await.unwrap();

        assert_eq!(event.sync_status, SyncStatus::NeedsAuth);
        assert_eq!(event.sync_error.as_deref(), Some(NOT_AUTHORIZED));
        token.assert_async().await;
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_sync_success() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_OK)
            .expect(1)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-xyz")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "evt_001"}"#)
            .expect(2)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        let config = test_config(&server.url());
        let mut state =
            SyncEngineState::Configured(CalendarClient::new(&config, "refresh-abc").unwrap());

        let event = state.sync_event(&db, pending_event(&db).await).await.unwrap();
        assert_eq!(event.sync_status, SyncStatus::Synced);
        assert_eq!(event.external_event_id.as_deref(), Some("evt_001"));
        assert!(event.last_sync_at.is_some());

        // The access token is cached between calls
        let other = insert_local_event(&db, new_event("Appuntamento Bianchi", None))
            .await
            .unwrap()
            .unwrap();
        let other = state.sync_event(&db, other).await.unwrap();
        assert_eq!(other.sync_status, SyncStatus::Synced);

        token.assert_async().await;
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_transient_failure_marks_failed() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(TOKEN_OK)
            .create_async()
            .await;
        let _insert = server
            .mock("POST", "/calendars/primary/events")
            .with_status(500)
            .with_body(r#"{"error": {"code": 500, "message": "Backend Error"}}"#)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        save_refresh_token(&db, CALENDAR_SERVICE, "refresh-abc")
            .await
            .unwrap();
        let config = test_config(&server.url());
        let mut state = SyncEngineState::initialize(&db, &config).await.unwrap();

        let event = state.sync_event(&db, pending_event(&db).await).await.unwrap();
        assert_eq!(event.sync_status, SyncStatus::Failed);
        assert!(event.sync_error.unwrap().contains("Backend Error"));

        // A transient failure leaves the credential alone
        assert!(state.is_configured());
        assert_eq!(
            find_refresh_token(&db, CALENDAR_SERVICE).await.unwrap(),
            Some(String::from("refresh-abc"))
        );
    }

    #[tokio::test]
    async fn test_invalid_grant_deletes_credential() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(INVALID_GRANT)
            .expect(1)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .expect(0)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        save_refresh_token(&db, CALENDAR_SERVICE, "revoked")
            .await
            .unwrap();
        let config = test_config(&server.url());
        let mut state = SyncEngineState::initialize(&db, &config).await.unwrap();

        let event = state.sync_event(&db, pending_event(&db).await).await.unwrap();
        assert_eq!(event.sync_status, SyncStatus::NeedsAuth);
        assert!(event.sync_error.as_deref().unwrap().contains("invalid_grant"));
        assert!(!state.is_configured());
        assert_eq!(find_refresh_token(&db, CALENDAR_SERVICE).await.unwrap(), None);

        // Later attempts don't reach Google at all
        let again = state.sync_event(&db, event).await.unwrap();
        assert_eq!(again.sync_status, SyncStatus::NeedsAuth);
        token.assert_async().await;
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_reinitialize_after_reauthorization() {
        let db = memory_db().await.unwrap();
        let config = test_config("http://localhost");
        let mut state = SyncEngineState::Unconfigured;

        state.reinitialize(&db, &config).await.unwrap();
        assert!(!state.is_configured());

        save_refresh_token(&db, CALENDAR_SERVICE, "fresh").await.unwrap();
        state.reinitialize(&db, &config).await.unwrap();
        assert!(state.is_configured());
    }

    #[tokio::test]
    async fn test_existing_remote_event_is_updated() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(TOKEN_OK)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/calendars/primary/events/evt_001")
            .with_status(200)
            .with_body(r#"{"id": "evt_001"}"#)
            .expect(1)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .expect(0)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        let event = pending_event(&db).await;
        let event = mark_failed(&db, event.id, "boom").await.unwrap();
        let event = mark_synced(&db, event.id, "evt_001").await.unwrap();
        let event = mark_failed(&db, event.id, "boom").await.unwrap();

        let config = test_config(&server.url());
        let mut state =
            SyncEngineState::Configured(CalendarClient::new(&config, "refresh-abc").unwrap());
        let event = state.sync_event(&db, event).await.unwrap();
        assert_eq!(event.sync_status, SyncStatus::Synced);
        assert_eq!(event.external_event_id.as_deref(), Some("evt_001"));
        update.assert_async().await;
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_deleted_remote_event_is_recreated() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(TOKEN_OK)
            .create_async()
            .await;
        let _update = server
            .mock("PUT", "/calendars/primary/events/evt_old")
            .with_status(404)
            .with_body(r#"{"error": {"code": 404, "message": "Not Found"}}"#)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .with_status(200)
            .with_body(r#"{"id": "evt_new"}"#)
            .expect(1)
            .create_async()
            .await;

        let db = memory_db().await.unwrap();
        let event = pending_event(&db).await;
        let event = mark_synced(&db, event.id, "evt_old").await.unwrap();

        let config = test_config(&server.url());
        let mut state =
            SyncEngineState::Configured(CalendarClient::new(&config, "refresh-abc").unwrap());
        let event = state.sync_event(&db, event).await.unwrap();
        assert_eq!(event.external_event_id.as_deref(), Some("evt_new"));
        insert.assert_async().await;
    }
}
