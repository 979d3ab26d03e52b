use chat_api::url::{
    chat_url, normalize_base_url, session_detail_url, session_messages_url, session_url,
    sessions_url, users_url, DEFAULT_BASE_URL,
};

#[test]
fn normalize_strips_trailing_slashes_and_defaults_empty_input() {
    assert_eq!(
        normalize_base_url("https://chat.example.com/api/"),
        "https://chat.example.com/api"
    );
    assert_eq!(normalize_base_url("   "), DEFAULT_BASE_URL);
}

#[test]
fn endpoint_builders_compose_expected_paths() {
    let base = "https://chat.example.com/api";

    assert_eq!(session_url(base), "https://chat.example.com/api/session");
    assert_eq!(users_url(base), "https://chat.example.com/api/users");
    assert_eq!(
        sessions_url(base, 1),
        "https://chat.example.com/api/sessions?limit=1"
    );
    assert_eq!(
        session_detail_url(base, "session-3"),
        "https://chat.example.com/api/sessions/session-3"
    );
    assert_eq!(
        session_messages_url(base, "session-3", 50, 100),
        "https://chat.example.com/api/sessions/session-3/messages?limit=50&offset=100"
    );
    assert_eq!(chat_url(base), "https://chat.example.com/api/chat");
}
