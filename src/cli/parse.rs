use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;

use crate::parse::extract;

/// Dry run of the parser, nothing is stored or synced.
pub fn run(text: &str, sender: &str, timezone: Tz) -> Result<()> {
    let today = Utc::now().with_timezone(&timezone).date_naive();
    match extract(text, sender, today) {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("Not an appointment confirmation"),
    }
    Ok(())
}
