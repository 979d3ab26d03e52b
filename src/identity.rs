/// Snapshot of the authenticated identity provided by the auth
/// collaborator. The core never derives identity itself; it only scopes
/// sessions to whatever the collaborator reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Option<String>,
    pub is_authenticated: bool,
}

impl UserIdentity {
    #[must_use]
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_authenticated: true,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}
