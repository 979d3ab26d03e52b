use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum ChatApiError {
    InvalidBaseUrl(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    /// 400/404 from session creation whose body names an unknown owning
    /// user; the caller may attempt corrective registration once.
    UserNotFound(String),
    /// 403/404 from a session-scoped fetch: the session id is no longer
    /// valid and local state must be discarded.
    SessionInvalid {
        status: StatusCode,
        session_id: String,
    },
    Serde(JsonError),
    StreamFailed {
        detail: String,
    },
    Cancelled,
    RetryExhausted {
        attempts: u32,
        last_error: Option<String>,
    },
}

impl ChatApiError {
    /// 500/503 creation faults block further automatic creation attempts.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Status(status, _)
                if *status == StatusCode::INTERNAL_SERVER_ERROR
                    || *status == StatusCode::SERVICE_UNAVAILABLE
        )
    }

    #[must_use]
    pub fn is_permanent_rejection(&self) -> bool {
        matches!(
            self,
            Self::Status(status, _)
                if *status == StatusCode::BAD_REQUEST || *status == StatusCode::NOT_FOUND
        )
    }

    #[must_use]
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid { .. })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorBodyFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBodyFields {
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for ChatApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::InvalidHeader(value) => write!(f, "invalid header: {value}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::UserNotFound(message) => write!(f, "owning user not found: {message}"),
            Self::SessionInvalid { status, session_id } => {
                write!(f, "session '{session_id}' rejected with HTTP {status}")
            }
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::StreamFailed { detail } => write!(f, "stream failed: {detail}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::RetryExhausted {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "lookup exhausted after {attempts} attempts (last_error: {last_error:?})"
                )
            }
        }
    }
}

impl std::error::Error for ChatApiError {}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ChatApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from an error response body.
///
/// Understands `{"detail": "..."}` and `{"error": {"message": "..."}}`
/// envelopes; falls back to the raw body or the status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(detail) = parsed.detail.as_deref().filter(|value| !value.is_empty()) {
            return detail.to_string();
        }
        if let Some(message) = parsed
            .error
            .and_then(|error| error.message)
            .filter(|value| !value.is_empty())
        {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Whether an error body names an unknown owning user.
pub fn body_indicates_missing_user(body: &str) -> bool {
    body.to_ascii_lowercase().contains("user not found")
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{body_indicates_missing_user, parse_error_message};

    #[test]
    fn parse_error_message_prefers_detail_envelope() {
        let message = parse_error_message(
            StatusCode::NOT_FOUND,
            r#"{"detail":"User not found for session"}"#,
        );
        assert_eq!(message, "User not found for session");
    }

    #[test]
    fn parse_error_message_reads_nested_error_envelope() {
        let message =
            parse_error_message(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad id"}}"#);
        assert_eq!(message, "bad id");
    }

    #[test]
    fn parse_error_message_falls_back_to_reason_for_empty_body() {
        let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(message, "Service Unavailable");
    }

    #[test]
    fn missing_user_detection_is_case_insensitive() {
        assert!(body_indicates_missing_user(
            r#"{"detail":"User Not Found"}"#
        ));
        assert!(!body_indicates_missing_user(r#"{"detail":"no session"}"#));
    }
}
