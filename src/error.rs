use thiserror::Error;

use chat_api::ChatApiError;
use session_store::SessionStoreError;

use crate::transcript::TranscriptError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not authenticated; sign in to start a conversation")]
    NotAuthenticated,

    /// A standing creation block is in effect; cleared only by an
    /// explicit retry action or reload.
    #[error("session creation is blocked: {detail}")]
    CreationBlocked { detail: String },

    /// Another caller is creating the session right now. Skip and
    /// re-resolve on the next trigger; do not queue.
    #[error("session creation already in progress")]
    CreationInProgress,

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Api(#[from] ChatApiError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),
}
