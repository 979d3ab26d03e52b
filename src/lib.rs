//! Session identity reconciliation and streaming-response core for
//! transcript-style chat clients.
//!
//! The library keeps one coherent notion of "which conversation is
//! active" across three independently-mutating sources of truth
//! (persisted storage, the authenticated backend, and in-memory state)
//! while consuming an incrementally-streamed assistant response.
//!
//! ## Shape
//!
//! - [`SessionResolver`] decides which session the user is in, with
//!   single-flight creation deferred to the first outgoing message.
//! - [`TranscriptController`] owns the message list and the
//!   `Idle → Sending → Streaming → Settled` state machine, including
//!   edit-and-regenerate truncation.
//! - [`ChatSession`] is the send/stream orchestrator binding the two to
//!   the `chat_api` transport and the `session_store` record.
//! - [`SyncEventBus`] propagates session lifecycle events to every
//!   component; [`StorageWatcher`] extends it across processes sharing
//!   a storage root.
//!
//! There is no process entry point; UI code consumes this as a library.

pub mod backend;
pub mod bus;
pub mod chat;
pub mod completion;
pub mod config;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod singleflight;
pub mod transcript;
pub mod watch;

pub use backend::ChatBackend;
pub use bus::{SessionSyncEvent, SyncEventBus};
pub use chat::{ChatSession, SendOutcome};
pub use completion::{
    CompletionPredicate, NeverComplete, PhraseCompletion, DEFAULT_COMPLETION_PHRASES,
};
pub use config::ChatSessionConfig;
pub use error::CoreError;
pub use identity::UserIdentity;
pub use resolver::{CreationBlock, SessionDirective, SessionResolver};
pub use singleflight::{SingleFlight, SingleFlightPermit};
pub use transcript::{
    EditDirective, Role, SendState, TranscriptController, TranscriptError, TranscriptMessage,
    COMPLETED_CONVERSATION_REPLY, EMPTY_RESPONSE_NOTICE, STREAM_ERROR_NOTICE,
};
pub use watch::StorageWatcher;

pub use chat_api::{AttachedFile, CancellationSignal};
pub use session_store::{
    storage_root, FileStorage, MemoryStorage, SessionStore, StorageBackend, StoredSession,
    SESSION_STORAGE_KEY,
};
