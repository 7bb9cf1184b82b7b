pub mod gcal;
pub mod oauth;

use reqwest::{Response, StatusCode};
use serde_json::Value;

/// Failure talking to a Google API.
#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("Google API returned {status}: {body}")]
    Status {
        status: StatusCode,
        error_code: Option<String>,
        body: String,
    },
    #[error("Google API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected Google API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GoogleApiError {
    /// Build an error from a non-success response, keeping the raw body
    /// for diagnostics.
    pub async fn from_response(resp: Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let error_code = error_code(&body);
        Self::Status {
            status,
            error_code,
            body,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(err) => err.status(),
            Self::Decode(_) => None,
        }
    }

    /// The refresh token was revoked or expired. Retrying won't help
    /// until the user authorizes again.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(
            self,
            Self::Status { status, error_code: Some(code), .. }
                if *status == StatusCode::BAD_REQUEST && code == "invalid_grant"
        )
    }
}

/// Pull the error code out of either error body shape Google uses:
/// `{"error": "invalid_grant"}` from the OAuth endpoints and
/// `{"error": {"status": "...", "errors": [{"reason": "..."}]}}` from
/// the Calendar API.
fn error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(code) => Some(code.clone()),
        Value::Object(obj) => obj
            .get("errors")
            .and_then(|errors| errors.get(0))
            .and_then(|e| e.get("reason"))
            .or_else(|| obj.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
