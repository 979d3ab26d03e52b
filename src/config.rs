/// Behavior knobs for [`crate::ChatSession`].
#[derive(Debug, Clone)]
pub struct ChatSessionConfig {
    /// Page size for history fetches.
    pub history_page_size: u32,
    /// Forwarded on every chat request.
    pub enable_web_search: bool,
    /// Most-recent-session lookup window during resolution.
    pub recent_lookup_limit: u32,
}

impl Default for ChatSessionConfig {
    fn default() -> Self {
        Self {
            history_page_size: 50,
            enable_web_search: false,
            recent_lookup_limit: 1,
        }
    }
}

impl ChatSessionConfig {
    pub fn with_history_page_size(mut self, history_page_size: u32) -> Self {
        self.history_page_size = history_page_size;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }
}
