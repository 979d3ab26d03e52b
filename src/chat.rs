use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use chat_api::{AttachedFile, CancellationSignal, ChatRequest, MessageRecord};
use session_store::SessionStore;

use crate::backend::ChatBackend;
use crate::bus::{SessionSyncEvent, SyncEventBus};
use crate::config::ChatSessionConfig;
use crate::error::CoreError;
use crate::identity::UserIdentity;
use crate::resolver::{SessionDirective, SessionResolver};
use crate::singleflight::SingleFlight;
use crate::transcript::{
    Role, TranscriptController, TranscriptMessage, STREAM_ERROR_NOTICE,
};

/// What happened to one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The stream settled; the transcript holds this final content.
    Streamed {
        content: String,
        session_id: String,
    },
    /// The completion gate intercepted the send; the canned reply was
    /// appended and the backend was never contacted.
    GatedByCompletion,
}

/// The send/stream orchestrator: glues resolver, transport, transcript,
/// store, and bus into the chat panel's behavior.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    resolver: SessionResolver,
    bus: SyncEventBus,
    transcript: TranscriptController,
    identity: UserIdentity,
    config: ChatSessionConfig,
    cancellation: CancellationSignal,
}

impl ChatSession {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: SessionStore,
        bus: SyncEventBus,
        identity: UserIdentity,
        config: ChatSessionConfig,
    ) -> Self {
        let resolver = SessionResolver::new(Arc::clone(&backend), store, bus.clone())
            .with_lookup_limit(config.recent_lookup_limit);
        Self::with_resolver(backend, resolver, bus, identity, config)
    }

    /// Construct with an isolated single-flight coordinator instead of
    /// the process-wide one; used by embedders running several
    /// independent session scopes (and by tests).
    #[must_use]
    pub fn with_isolated_coordinator(
        backend: Arc<dyn ChatBackend>,
        store: SessionStore,
        bus: SyncEventBus,
        identity: UserIdentity,
        config: ChatSessionConfig,
    ) -> Self {
        let resolver = SessionResolver::with_coordinator(
            Arc::clone(&backend),
            store,
            bus.clone(),
            SingleFlight::new(),
        )
        .with_lookup_limit(config.recent_lookup_limit);
        Self::with_resolver(backend, resolver, bus, identity, config)
    }

    #[must_use]
    pub fn with_resolver(
        backend: Arc<dyn ChatBackend>,
        resolver: SessionResolver,
        bus: SyncEventBus,
        identity: UserIdentity,
        config: ChatSessionConfig,
    ) -> Self {
        Self {
            backend,
            resolver,
            bus,
            transcript: TranscriptController::new(),
            identity,
            config,
            cancellation: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn transcript(&self) -> &TranscriptController {
        &self.transcript
    }

    #[must_use]
    pub fn messages(&self) -> &[TranscriptMessage] {
        self.transcript.messages()
    }

    #[must_use]
    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    pub fn set_identity(&mut self, identity: UserIdentity) {
        self.identity = identity;
    }

    /// Handle the UI can trip to abort an in-flight stream. The stream
    /// then settles deterministically with the retryable error notice.
    #[must_use]
    pub fn cancellation_handle(&self) -> CancellationSignal {
        Arc::clone(&self.cancellation)
    }

    /// Send a user message, creating the session on first send.
    pub async fn send(
        &mut self,
        text: impl Into<String>,
        attached_files: Vec<AttachedFile>,
    ) -> Result<SendOutcome, CoreError> {
        let text = text.into();

        if self.transcript.is_completed() {
            debug!("completion gate set; answering locally");
            self.transcript.gated_reply(text.as_str());
            return Ok(SendOutcome::GatedByCompletion);
        }

        let session_id = self.require_session().await?;
        self.transcript.begin_send(text.as_str(), attached_files)?;
        self.run_stream(session_id, text, None).await
    }

    /// Edit the user message at `index` and regenerate from there.
    ///
    /// `attached_files: None` carries the edited message's attachments.
    pub async fn edit(
        &mut self,
        index: usize,
        text: impl Into<String>,
        attached_files: Option<Vec<AttachedFile>>,
    ) -> Result<SendOutcome, CoreError> {
        let text = text.into();
        let session_id = self.require_session().await?;
        let directive = self
            .transcript
            .edit_and_resend(index, text.as_str(), attached_files)?;
        self.run_stream(session_id, text, directive.edit_from_message_id)
            .await
    }

    /// Install persisted history for the active session, recovering
    /// automatically when the backend rejects the session id.
    pub async fn load_history(&mut self) -> Result<usize, CoreError> {
        let Some(session_id) = self
            .resolver
            .resolve(SessionDirective::Auto, &self.identity)
            .await?
        else {
            return Ok(0);
        };

        match self.fetch_and_install(&session_id).await {
            Ok(count) => Ok(count),
            Err(CoreError::Api(error)) if error.is_session_invalid() => {
                debug!(%session_id, "session rejected by backend; clearing and re-resolving");
                self.resolver.reset()?;

                let Some(next) = self
                    .resolver
                    .resolve(SessionDirective::Auto, &self.identity)
                    .await?
                else {
                    return Ok(0);
                };

                match self.fetch_and_install(&next).await {
                    Ok(count) => Ok(count),
                    Err(CoreError::Api(error)) if error.is_session_invalid() => {
                        warn!(session_id = %next, "re-resolved session also invalid; starting empty");
                        self.resolver.reset()?;
                        Ok(0)
                    }
                    Err(error) => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Clear the transcript, the completion gate, and all session state.
    pub fn new_conversation(&mut self) -> Result<(), CoreError> {
        self.transcript.new_conversation();
        self.resolver.reset()
    }

    /// Delete a session on the backend and broadcast the removal. When
    /// it names the active session, local state is cleared too.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<(), CoreError> {
        self.backend.delete_session(session_id).await?;

        if self.resolver.active_session().as_deref() == Some(session_id) {
            self.transcript.new_conversation();
            self.resolver.reset()?;
        }

        self.bus.publish(SessionSyncEvent::Deleted {
            session_id: session_id.to_owned(),
        });
        Ok(())
    }

    async fn require_session(&self) -> Result<String, CoreError> {
        match self.resolver.ensure_session(&self.identity).await? {
            Some(session_id) => Ok(session_id),
            None => Err(CoreError::CreationInProgress),
        }
    }

    async fn run_stream(
        &mut self,
        session_id: String,
        text: String,
        edit_from_message_id: Option<String>,
    ) -> Result<SendOutcome, CoreError> {
        self.cancellation.store(false, Ordering::Release);

        let mut request = ChatRequest::new(text, session_id.clone())
            .with_attachments(self.transcript.pending_attachments())
            .with_web_search(self.config.enable_web_search);
        if let Some(message_id) = edit_from_message_id {
            request = request.with_edit_from(message_id);
        }

        let backend = Arc::clone(&self.backend);
        let cancellation = Arc::clone(&self.cancellation);
        let transcript = &mut self.transcript;
        let result = backend
            .stream_chat(&request, Some(&cancellation), &mut |_event, accumulator| {
                transcript.apply_stream_snapshot(accumulator.snapshot());
            })
            .await;

        match result {
            Ok(outcome) => {
                let substituted = self.transcript.settle_success(outcome.message_id.clone());
                if substituted {
                    warn!("stream settled with no content; substituted fallback notice");
                }

                let confirmed = outcome.session_id.unwrap_or(session_id);
                self.resolver
                    .commit_stream_session(&confirmed, &self.identity)?;

                let content = self
                    .transcript
                    .last_assistant()
                    .map(|message| message.content.clone())
                    .unwrap_or_default();
                Ok(SendOutcome::Streamed {
                    content,
                    session_id: confirmed,
                })
            }
            Err(error) => {
                // Settle first so the transcript is never left half
                // updated behind a surfaced error.
                self.transcript.settle_error(STREAM_ERROR_NOTICE);
                Err(CoreError::Api(error))
            }
        }
    }

    async fn fetch_and_install(&mut self, session_id: &str) -> Result<usize, CoreError> {
        let records = self
            .backend
            .fetch_messages(session_id, self.config.history_page_size, 0)
            .await?;
        let messages: Vec<TranscriptMessage> =
            records.into_iter().map(transcript_message_from).collect();
        let count = messages.len();
        self.transcript.replace_all(messages)?;
        Ok(count)
    }
}

fn transcript_message_from(record: MessageRecord) -> TranscriptMessage {
    let role = if record.role.eq_ignore_ascii_case("user") {
        Role::User
    } else {
        Role::Assistant
    };

    TranscriptMessage {
        role,
        content: record.content,
        attached_files: record.metadata.attached_files,
        server_message_id: record.message_id,
        created_at: record.created_at,
    }
}
