use serde::{Deserialize, Serialize};

/// Opaque reference to an uploaded file carried alongside a message.
///
/// Produced by the upload collaborator; this crate never inspects the
/// referenced asset, it only round-trips the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

/// Body for `POST /session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
}

/// Response from `POST /session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHandshake {
    #[serde(default)]
    pub success: bool,
    pub session_id: String,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body for the corrective `POST /users` registration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
}

/// One entry from the `GET /sessions` listing, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

/// One persisted message from `GET /sessions/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub attached_files: Vec<AttachedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

/// Request payload for the streaming `POST /chat` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_files: Vec<AttachedFile>,
    /// Server message id the backend should truncate from before
    /// regenerating; present only for edit-and-resend turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_from_message_id: Option<String>,
    #[serde(default)]
    pub enable_web_search: bool,
}

impl ChatRequest {
    pub fn new(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            attached_files: Vec::new(),
            edit_from_message_id: None,
            enable_web_search: false,
        }
    }

    pub fn with_attachments(mut self, attached_files: Vec<AttachedFile>) -> Self {
        self.attached_files = attached_files;
        self
    }

    pub fn with_edit_from(mut self, message_id: impl Into<String>) -> Self {
        self.edit_from_message_id = Some(message_id.into());
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }
}
