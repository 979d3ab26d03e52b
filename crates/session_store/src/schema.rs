use serde::{Deserialize, Serialize};

/// The single persisted session record.
///
/// Field names match the storage schema exactly. Writers always persist
/// the complete record; partial-field patches would let two components
/// clobber each other's writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_locally_at: Option<String>,
}

impl StoredSession {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: Option<impl Into<String>>,
        is_authenticated: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.map(Into::into),
            is_authenticated,
            created_locally_at: None,
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, created_locally_at: impl Into<String>) -> Self {
        self.created_locally_at = Some(created_locally_at.into());
        self
    }

    /// Whether the record is scoped to the given user identity.
    ///
    /// A mismatched owner is the sole trigger for discarding a stored
    /// session during resolution.
    #[must_use]
    pub fn belongs_to(&self, user_id: Option<&str>) -> bool {
        self.user_id.as_deref() == user_id
    }
}
