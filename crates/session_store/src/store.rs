use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::schema::StoredSession;
use crate::storage::StorageBackend;

/// Storage key holding the persisted session record.
pub const SESSION_STORAGE_KEY: &str = "parley.session";

/// Typed wrapper over persistent key/value storage for the session
/// record. Pure read/write; holds no policy about when to persist.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Load the persisted record, failing closed: a read failure or a
    /// malformed record is treated as absent, and the corrupt entry is
    /// cleared so the next read starts from a clean slate.
    pub fn load(&self) -> Option<StoredSession> {
        let raw = match self.backend.read(SESSION_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(_) => return None,
        };

        match parse_record(&raw) {
            Some(record) => Some(record),
            None => {
                let _ = self.backend.remove(SESSION_STORAGE_KEY);
                None
            }
        }
    }

    /// Persist the complete record.
    pub fn save(&self, record: &StoredSession) -> Result<(), SessionStoreError> {
        let raw = serde_json::to_string(record).map_err(SessionStoreError::Serialize)?;
        self.backend.write(SESSION_STORAGE_KEY, &raw)
    }

    pub fn clear(&self) -> Result<(), SessionStoreError> {
        self.backend.remove(SESSION_STORAGE_KEY)
    }
}

fn parse_record(raw: &str) -> Option<StoredSession> {
    let record = serde_json::from_str::<StoredSession>(raw).ok()?;
    if record.session_id.trim().is_empty() {
        return None;
    }
    if let Some(timestamp) = &record.created_locally_at {
        OffsetDateTime::parse(timestamp, &Rfc3339).ok()?;
    }

    Some(record)
}

/// Current UTC time formatted for the `createdLocallyAt` field.
pub fn utc_now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}
