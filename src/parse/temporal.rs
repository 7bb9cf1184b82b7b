//! Resolves the date and time fragments isolated by the parser rules
//! into a local wall-clock date-time.
//!
//! Nothing here knows about timezones. The resulting `NaiveDateTime`
//! is interpreted in the configured calendar timezone when the event
//! is pushed to Google.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;

/// A weekday + `DD/MM` date more than this many days in the past is
/// assumed to refer to next year.
pub const PAST_DATE_ROLLOVER_DAYS: i64 = 30;

/// Italian weekday names, accented or not. Shared with the parser rules.
pub const WEEKDAY_PATTERN: &str =
    r"(?:luned[iìí]|marted[iìí]|mercoled[iìí]|gioved[iìí]|venerd[iìí]|sabato|domenica)";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

static WEEKDAY_DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^({})\s+(\d{{1,2}})/(\d{{1,2}})$",
        WEEKDAY_PATTERN
    ))
    .unwrap()
});

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?$").unwrap());

/// Resolve both fragments into a local date-time.
pub fn resolve(
    date_fragment: &str,
    time_fragment: &str,
    today: NaiveDate,
) -> Option<NaiveDateTime> {
    let date = resolve_date(date_fragment, today)?;
    let time = resolve_time(time_fragment)?;
    Some(date.and_time(time))
}

pub fn resolve_date(fragment: &str, today: NaiveDate) -> Option<NaiveDate> {
    let fragment = fragment.trim();
    let lower = fragment.to_lowercase();

    match lower.as_str() {
        "oggi" | "today" => return Some(today),
        "domani" | "tomorrow" => return today.succ_opt(),
        _ => {}
    }

    if let Some(caps) = ISO_DATE.captures(fragment) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }

    if let Some(caps) = FULL_DATE.captures(fragment) {
        return NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        );
    }

    if let Some(caps) = WEEKDAY_DAY_MONTH.captures(fragment) {
        return day_month_nearest_year(caps[2].parse().ok()?, caps[3].parse().ok()?, today);
    }

    parse_weekday(&lower).map(|weekday| next_weekday(today, weekday))
}

/// `HH:MM` or a bare `HH`.
pub fn resolve_time(fragment: &str) -> Option<NaiveTime> {
    let caps = TIME.captures(fragment.trim())?;
    let hour = caps[1].parse().ok()?;
    let minute = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Day and month without a year land in the current year unless that
/// is more than `PAST_DATE_ROLLOVER_DAYS` ago.
fn day_month_nearest_year(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if (today - candidate).num_days() > PAST_DATE_ROLLOVER_DAYS {
        return NaiveDate::from_ymd_opt(today.year() + 1, month, day);
    }
    Some(candidate)
}

/// Strictly after today: asking for today's weekday yields next week.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut days_ahead = (target - current).rem_euclid(7);
    if days_ahead == 0 {
        days_ahead = 7;
    }
    today + Duration::days(days_ahead)
}

pub(crate) fn parse_weekday(name: &str) -> Option<Weekday> {
    let normalized = name.trim().to_lowercase().replace(['ì', 'í'], "i");
    match normalized.as_str() {
        "lunedi" => Some(Weekday::Mon),
        "martedi" => Some(Weekday::Tue),
        "mercoledi" => Some(Weekday::Wed),
        "giovedi" => Some(Weekday::Thu),
        "venerdi" => Some(Weekday::Fri),
        "sabato" => Some(Weekday::Sat),
        "domenica" => Some(Weekday::Sun),
        _ => None,
    }
}
