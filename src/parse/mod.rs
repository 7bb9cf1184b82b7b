//! Appointment confirmation parser
//!
//! Turns a free-text confirmation received over the messaging channel
//! into an [`AppointmentData`]. A message that doesn't look like a
//! confirmation yields `None`, never an error.

pub mod rules;
pub mod temporal;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use rules::{ADDRESS_RULES, DATE_TIME_RULES, NAME_RULES, SALUTATION_RULE, first_match};

pub const DEFAULT_SALUTATION: &str = "Gentile";

/// Location used when the message doesn't say where to meet.
pub const UNSPECIFIED_ADDRESS: &str = "Indirizzo da definire";

/// Senders used by the messaging fixtures.
const TEST_SENDERS: &[&str] = &["+390000000000", "390000000000", "+391234567890", "test"];

/// Message markers used by the messaging fixtures.
const TEST_TEXT_MARKERS: &[&str] = &[
    "[test]",
    "messaggio di prova",
    "messaggio di test",
    "cliente test",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentData {
    pub client_name: String,
    pub salutation: String,
    pub phone: String,
    pub appointment_start: NaiveDateTime,
    pub address: String,
}

/// Extract appointment details from a confirmation message.
///
/// `today` is the current date in the calendar timezone and anchors
/// relative expressions like "domani" or a bare weekday.
pub fn extract(text: &str, sender: &str, today: NaiveDate) -> Option<AppointmentData> {
    if is_test_message(text, sender) {
        tracing::debug!("Ignoring test fixture message from {}", sender);
        return None;
    }

    let Some((name_rule, client_name)) = first_match(&NAME_RULES, text) else {
        tracing::debug!("No client name found, not an appointment confirmation");
        return None;
    };

    let salutation = SALUTATION_RULE
        .apply(text)
        .unwrap_or_else(|| DEFAULT_SALUTATION.to_string());

    let Some((date_rule, fragments)) = first_match(&DATE_TIME_RULES, text) else {
        tracing::debug!("No appointment date found for {}", client_name);
        return None;
    };

    let Some(appointment_start) = temporal::resolve(&fragments.date, &fragments.time, today)
    else {
        tracing::info!(
            "Could not resolve date '{}' time '{}' (rule {})",
            fragments.date,
            fragments.time,
            date_rule
        );
        return None;
    };

    let address = match first_match(&ADDRESS_RULES, text) {
        Some((_, address)) => address,
        None => UNSPECIFIED_ADDRESS.to_string(),
    };

    tracing::debug!(
        "Parsed appointment for {} at {} (name rule {}, date rule {})",
        client_name,
        appointment_start,
        name_rule,
        date_rule
    );

    Some(AppointmentData {
        client_name,
        salutation,
        phone: sender.to_string(),
        appointment_start,
        address,
    })
}

pub fn is_test_message(text: &str, sender: &str) -> bool {
    let sender: String = sender.chars().filter(|c| !c.is_whitespace()).collect();
    if TEST_SENDERS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&sender))
    {
        return true;
    }

    let text = text.to_lowercase();
    TEST_TEXT_MARKERS.iter().any(|marker| text.contains(marker))
}
