//! Content fingerprint identifying one logical appointment.

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

/// SHA-256 over title, start and location. Equal inputs always give
/// the same key regardless of process or insertion order.
pub fn derive_key(title: &str, start: NaiveDateTime, location: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(start.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(location.as_bytes());
    hex::encode(hasher.finalize())
}
