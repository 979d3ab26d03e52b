/// Default base URL for backend requests.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Normalize a base URL for endpoint construction.
///
/// Empty/whitespace input falls back to [`DEFAULT_BASE_URL`]; trailing
/// slashes are stripped so endpoint builders can append paths verbatim.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

pub fn session_url(base: &str) -> String {
    format!("{}/session", normalize_base_url(base))
}

pub fn users_url(base: &str) -> String {
    format!("{}/users", normalize_base_url(base))
}

pub fn sessions_url(base: &str, limit: u32) -> String {
    format!("{}/sessions?limit={limit}", normalize_base_url(base))
}

pub fn session_detail_url(base: &str, session_id: &str) -> String {
    format!("{}/sessions/{session_id}", normalize_base_url(base))
}

pub fn session_messages_url(base: &str, session_id: &str, limit: u32, offset: u32) -> String {
    format!(
        "{}/sessions/{session_id}/messages?limit={limit}&offset={offset}",
        normalize_base_url(base)
    )
}

pub fn chat_url(base: &str) -> String {
    format!("{}/chat", normalize_base_url(base))
}
