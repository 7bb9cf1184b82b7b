//! Google Calendar v3 events API

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::GoogleApiError;
use crate::sync::models::CalendarEvent;

/// Popup reminders a day and two hours before the appointment.
pub const REMINDER_MINUTES: [i64; 2] = [1440, 120];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// Local wall-clock time, no offset
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub reminders: Reminders,
}

impl EventPayload {
    pub fn from_event(event: &CalendarEvent, timezone: Tz) -> Self {
        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start: event_date_time(event.start_date, timezone),
            end: event_date_time(event.end_date, timezone),
            reminders: Reminders {
                use_default: false,
                overrides: REMINDER_MINUTES
                    .iter()
                    .map(|minutes| ReminderOverride {
                        method: String::from("popup"),
                        minutes: *minutes,
                    })
                    .collect(),
            },
        }
    }
}

fn event_date_time(value: NaiveDateTime, timezone: Tz) -> EventDateTime {
    EventDateTime {
        date_time: value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: timezone.name().to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    pub html_link: Option<String>,
    pub status: Option<String>,
}

fn events_url(api_url: &str, calendar_id: &str) -> String {
    format!(
        "{}/calendars/{}/events",
        api_url.trim_end_matches('/'),
        urlencoding::encode(calendar_id)
    )
}

/// `events.insert`
pub async fn insert_event(
    client: &Client,
    api_url: &str,
    access_token: &str,
    calendar_id: &str,
    payload: &EventPayload,
) -> Result<RemoteEvent, GoogleApiError> {
    let url = events_url(api_url, calendar_id);
    let resp = client
        .post(&url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(GoogleApiError::from_response(resp).await);
    }
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// `events.update`, replacing the remote event with `payload`.
pub async fn update_event(
    client: &Client,
    api_url: &str,
    access_token: &str,
    calendar_id: &str,
    event_id: &str,
    payload: &EventPayload,
) -> Result<RemoteEvent, GoogleApiError> {
    let url = format!(
        "{}/{}",
        events_url(api_url, calendar_id),
        urlencoding::encode(event_id)
    );
    let resp = client
        .put(&url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(GoogleApiError::from_response(resp).await);
    }
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::sync::models::SyncStatus;

    fn event() -> CalendarEvent {
        let start = NaiveDate::from_ymd_opt(2027, 6, 10)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        CalendarEvent {
            id: 1,
            title: String::from("Appuntamento Rossi"),
            description: String::from("Cliente: Gentile Rossi"),
            location: String::from("Via Roma 5"),
            start_date: start,
            end_date: start + chrono::Duration::minutes(60),
            client_ref: None,
            property_ref: None,
            confirmation_ref: None,
            dedupe_key: String::from("key"),
            sync_status: SyncStatus::Pending,
            external_event_id: None,
            sync_error: None,
            last_sync_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_payload_uses_wall_clock_and_named_timezone() {
        let payload = EventPayload::from_event(&event(), chrono_tz::Europe::Rome);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "summary": "Appuntamento Rossi",
                "description": "Cliente: Gentile Rossi",
                "location": "Via Roma 5",
                "start": {"dateTime": "2027-06-10T16:00:00", "timeZone": "Europe/Rome"},
                "end": {"dateTime": "2027-06-10T17:00:00", "timeZone": "Europe/Rome"},
                "reminders": {
                    "useDefault": false,
                    "overrides": [
                        {"method": "popup", "minutes": 1440},
                        {"method": "popup", "minutes": 120}
                    ]
                }
            })
        );
    }

    #[tokio::test]
    async fn test_insert_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-xyz")
            .match_body(mockito::Matcher::PartialJson(json!({
                "summary": "Appuntamento Rossi",
                "start": {"dateTime": "2027-06-10T16:00:00", "timeZone": "Europe/Rome"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id": "evt_001", "status": "confirmed", "htmlLink": "https://calendar.google.com/event?eid=1"}"#,
            )
            .create_async()
            .await;

        let payload = EventPayload::from_event(&event(), chrono_tz::Europe::Rome);
        let created = insert_event(&Client::new(), &server.url(), "access-xyz", "primary", &payload)
            .await
            .unwrap();
        assert_eq!(created.id, "evt_001");
        assert_eq!(created.status.as_deref(), Some("confirmed"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/calendars/agency%40group.calendar.google.com/events/evt_001")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "evt_001"}"#)
            .create_async()
            .await;

        let payload = EventPayload::from_event(&event(), chrono_tz::Europe::Rome);
        let updated = update_event(
            &Client::new(),
            &server.url(),
            "access-xyz",
            "agency@group.calendar.google.com",
            "evt_001",
            &payload,
        )
        .await
        .unwrap();
        assert_eq!(updated.id, "evt_001");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_event_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/calendars/primary/events")
            .with_status(503)
            .with_body(
                r#"{"error": {"code": 503, "message": "Backend Error", "errors": [{"reason": "backendError"}]}}"#,
            )
            .create_async()
            .await;

        let payload = EventPayload::from_event(&event(), chrono_tz::Europe::Rome);
        let err = insert_event(&Client::new(), &server.url(), "access-xyz", "primary", &payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(err.to_string().contains("Backend Error"));
        assert!(!err.is_invalid_grant());
    }
}
