use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use chat_api::retry::{lookup_retry_delay, MAX_LOOKUP_ATTEMPTS};
use chat_api::{ChatApiError, SessionHandshake};
use session_store::{utc_now_rfc3339, SessionStore, StoredSession};

use crate::backend::ChatBackend;
use crate::bus::{SessionSyncEvent, SyncEventBus};
use crate::error::CoreError;
use crate::identity::UserIdentity;
use crate::singleflight::SingleFlight;

/// Caller intent for a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionDirective {
    /// Adopt a specific session (user opened a past conversation).
    Explicit(String),
    /// Force a fresh conversation; short-circuits every other source.
    NewConversation,
    /// Consult memory, then storage, then the backend.
    #[default]
    Auto,
}

impl SessionDirective {
    /// Normalize an explicit caller-supplied id. The explicit empty
    /// value means "force a new conversation".
    #[must_use]
    pub fn from_explicit(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            Self::NewConversation
        } else {
            Self::Explicit(id)
        }
    }
}

/// Standing marker blocking automatic creation after a server fault or
/// permanent rejection. Cleared only by an explicit retry or reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationBlock {
    pub detail: String,
    /// RFC3339 timestamp of when the block was set.
    pub since: String,
}

/// Produces exactly one active session id for the current identity.
///
/// Resolution order: explicit directive, in-memory state, stored record
/// (user-scoped), backend lookup. No session is created eagerly;
/// creation is deferred to the first outgoing message and guarded by a
/// single-flight coordinator so concurrent triggers cannot create
/// duplicates.
pub struct SessionResolver {
    backend: Arc<dyn ChatBackend>,
    store: SessionStore,
    bus: SyncEventBus,
    coordinator: Arc<SingleFlight>,
    creating: AtomicBool,
    active: Mutex<Option<String>>,
    block: Mutex<Option<CreationBlock>>,
    lookup_limit: u32,
}

impl SessionResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, store: SessionStore, bus: SyncEventBus) -> Self {
        Self::with_coordinator(backend, store, bus, SingleFlight::process_wide())
    }

    #[must_use]
    pub fn with_coordinator(
        backend: Arc<dyn ChatBackend>,
        store: SessionStore,
        bus: SyncEventBus,
        coordinator: Arc<SingleFlight>,
    ) -> Self {
        Self {
            backend,
            store,
            bus,
            coordinator,
            creating: AtomicBool::new(false),
            active: Mutex::new(None),
            block: Mutex::new(None),
            lookup_limit: 1,
        }
    }

    /// Window for the most-recent-session backend lookup.
    #[must_use]
    pub fn with_lookup_limit(mut self, lookup_limit: u32) -> Self {
        self.lookup_limit = lookup_limit.max(1);
        self
    }

    #[must_use]
    pub fn active_session(&self) -> Option<String> {
        lock_unpoisoned(&self.active).clone()
    }

    #[must_use]
    pub fn creation_block(&self) -> Option<CreationBlock> {
        lock_unpoisoned(&self.block).clone()
    }

    /// Manual retry action: lift the standing creation block.
    pub fn clear_creation_block(&self) {
        *lock_unpoisoned(&self.block) = None;
    }

    /// Drop the in-memory session without touching storage. Used when
    /// the backend rejects the id and storage is cleared separately.
    pub fn forget_active(&self) {
        *lock_unpoisoned(&self.active) = None;
    }

    /// Clear memory and storage and broadcast the reset.
    pub fn reset(&self) -> Result<(), CoreError> {
        self.forget_active();
        self.store.clear()?;
        self.bus.publish(SessionSyncEvent::Cleared);
        Ok(())
    }

    /// Resolve the active session id, first match wins. Returns `None`
    /// when no source produced a session; creation is deliberately not
    /// attempted here.
    pub async fn resolve(
        &self,
        directive: SessionDirective,
        identity: &UserIdentity,
    ) -> Result<Option<String>, CoreError> {
        match directive {
            SessionDirective::Explicit(session_id) => {
                self.adopt(&session_id, identity, SessionSyncEvent::Updated {
                    session_id: session_id.clone(),
                })?;
                Ok(Some(session_id))
            }
            SessionDirective::NewConversation => {
                self.reset()?;
                Ok(None)
            }
            SessionDirective::Auto => self.resolve_auto(identity).await,
        }
    }

    async fn resolve_auto(&self, identity: &UserIdentity) -> Result<Option<String>, CoreError> {
        if let Some(session_id) = self.active_session() {
            return Ok(Some(session_id));
        }

        if let Some(record) = self.store.load() {
            if record.belongs_to(identity.user_id.as_deref()) {
                debug!(session_id = %record.session_id, "adopting stored session");
                *lock_unpoisoned(&self.active) = Some(record.session_id.clone());
                return Ok(Some(record.session_id));
            }

            debug!("stored session belongs to a different user; discarding");
            self.store.clear()?;
        }

        self.lookup_most_recent(identity).await
    }

    /// Backend most-recent-session lookup. Bounded by attempt count;
    /// the final failure is treated as "no session", never as fatal.
    async fn lookup_most_recent(
        &self,
        identity: &UserIdentity,
    ) -> Result<Option<String>, CoreError> {
        for attempt in 1..=MAX_LOOKUP_ATTEMPTS {
            match self.backend.recent_sessions(self.lookup_limit).await {
                Ok(sessions) => {
                    let Some(summary) = sessions.into_iter().next() else {
                        return Ok(None);
                    };
                    self.adopt(&summary.session_id, identity, SessionSyncEvent::Updated {
                        session_id: summary.session_id.clone(),
                    })?;
                    return Ok(Some(summary.session_id));
                }
                Err(error) => {
                    warn!(attempt, %error, "recent session lookup failed");
                    if attempt < MAX_LOOKUP_ATTEMPTS {
                        tokio::time::sleep(lookup_retry_delay(attempt)).await;
                    }
                }
            }
        }

        Ok(None)
    }

    /// Ensure a session exists for this identity, creating one when
    /// every resolution source came up empty.
    ///
    /// Returns `Ok(None)` when another caller's creation is already in
    /// flight; such callers skip without queuing and re-resolve on
    /// their next trigger.
    pub async fn ensure_session(
        &self,
        identity: &UserIdentity,
    ) -> Result<Option<String>, CoreError> {
        if let Some(session_id) = self.resolve(SessionDirective::Auto, identity).await? {
            return Ok(Some(session_id));
        }

        if !identity.is_authenticated {
            return Err(CoreError::NotAuthenticated);
        }

        if let Some(block) = self.creation_block() {
            return Err(CoreError::CreationBlocked {
                detail: block.detail,
            });
        }

        let Some(_permit) = self.coordinator.try_acquire() else {
            debug!("session creation already in flight; skipping");
            return Ok(None);
        };
        if self.creating.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        let result = self.create_with_classification(identity).await;
        self.creating.store(false, Ordering::Release);
        result.map(Some)
    }

    async fn create_with_classification(
        &self,
        identity: &UserIdentity,
    ) -> Result<String, CoreError> {
        match self.backend.create_session(None).await {
            Ok(handshake) => self.commit_created(handshake, identity),
            Err(ChatApiError::UserNotFound(detail)) => {
                warn!(%detail, "owning user unknown; attempting corrective registration");
                let Some(user_id) = identity.user_id.as_deref() else {
                    return Err(self.classify_creation_failure(ChatApiError::UserNotFound(detail)));
                };
                self.backend.register_user(user_id).await?;
                match self.backend.create_session(None).await {
                    Ok(handshake) => self.commit_created(handshake, identity),
                    Err(error) => Err(self.classify_creation_failure(error)),
                }
            }
            Err(error) => Err(self.classify_creation_failure(error)),
        }
    }

    fn classify_creation_failure(&self, error: ChatApiError) -> CoreError {
        let blocking = error.is_server_fault()
            || error.is_permanent_rejection()
            || matches!(error, ChatApiError::UserNotFound(_));
        if !blocking {
            return CoreError::Api(error);
        }

        let detail = error.to_string();
        self.set_block(&detail);
        CoreError::CreationBlocked { detail }
    }

    fn set_block(&self, detail: &str) {
        let since = utc_now_rfc3339().unwrap_or_default();
        warn!(%detail, "blocking further automatic session creation");
        *lock_unpoisoned(&self.block) = Some(CreationBlock {
            detail: detail.to_owned(),
            since,
        });
    }

    fn commit_created(
        &self,
        handshake: SessionHandshake,
        identity: &UserIdentity,
    ) -> Result<String, CoreError> {
        let session_id = handshake.session_id;
        let record = StoredSession::new(
            session_id.clone(),
            identity.user_id.clone(),
            identity.is_authenticated,
        )
        .with_created_at(utc_now_rfc3339()?);
        self.store.save(&record)?;
        *lock_unpoisoned(&self.active) = Some(session_id.clone());
        self.bus.publish(SessionSyncEvent::Created {
            session_id: session_id.clone(),
        });
        Ok(session_id)
    }

    /// Commit the authoritative session id carried by a stream's
    /// metadata frame back into storage and broadcast it.
    pub fn commit_stream_session(
        &self,
        session_id: &str,
        identity: &UserIdentity,
    ) -> Result<(), CoreError> {
        let changed = self.active_session().as_deref() != Some(session_id);
        let record = StoredSession::new(
            session_id,
            identity.user_id.clone(),
            identity.is_authenticated,
        )
        .with_created_at(utc_now_rfc3339()?);
        self.store.save(&record)?;
        *lock_unpoisoned(&self.active) = Some(session_id.to_owned());

        let event = if changed {
            SessionSyncEvent::Created {
                session_id: session_id.to_owned(),
            }
        } else {
            SessionSyncEvent::Updated {
                session_id: session_id.to_owned(),
            }
        };
        self.bus.publish(event);
        Ok(())
    }

    fn adopt(
        &self,
        session_id: &str,
        identity: &UserIdentity,
        event: SessionSyncEvent,
    ) -> Result<(), CoreError> {
        let record = StoredSession::new(
            session_id,
            identity.user_id.clone(),
            identity.is_authenticated,
        )
        .with_created_at(utc_now_rfc3339()?);
        self.store.save(&record)?;
        *lock_unpoisoned(&self.active) = Some(session_id.to_owned());
        self.bus.publish(event);
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
