use thiserror::Error;

use chat_api::AttachedFile;

use crate::completion::{CompletionPredicate, PhraseCompletion};

/// Substituted when a stream settles with zero accumulated content.
pub const EMPTY_RESPONSE_NOTICE: &str = "No response was generated. Please try again.";
/// Replaces the assistant placeholder when the chat call itself fails.
pub const STREAM_ERROR_NOTICE: &str =
    "Something went wrong while generating a response. Please try again.";
/// Canned assistant reply for sends intercepted by the completion gate.
pub const COMPLETED_CONVERSATION_REPLY: &str =
    "This conversation has wrapped up. Start a new conversation to keep going.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. `attached_files` are immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
    pub attached_files: Vec<AttachedFile>,
    pub server_message_id: Option<String>,
    pub created_at: Option<String>,
}

impl TranscriptMessage {
    #[must_use]
    pub fn user(content: impl Into<String>, attached_files: Vec<AttachedFile>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attached_files,
            server_message_id: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attached_files: Vec::new(),
            server_message_id: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self::assistant(String::new())
    }
}

/// Lifecycle of one outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Settled,
}

/// Directive handed to the network layer for edit-and-resend turns, so
/// the backend can discard its tail state consistently with the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDirective {
    pub edit_from_message_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("a send is already in progress; wait for it to settle")]
    SendInProgress,

    #[error("message index {0} is not an editable user message")]
    InvalidEditTarget(usize),
}

/// Owns the ordered message list and the per-message send state machine.
///
/// While `Streaming`, only the last element of the list may change; the
/// compose surface stays disabled until the state settles.
pub struct TranscriptController {
    messages: Vec<TranscriptMessage>,
    state: SendState,
    completed: bool,
    completion: Box<dyn CompletionPredicate>,
}

impl Default for TranscriptController {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptController {
    #[must_use]
    pub fn new() -> Self {
        Self::with_predicate(Box::new(PhraseCompletion::new()))
    }

    #[must_use]
    pub fn with_predicate(completion: Box<dyn CompletionPredicate>) -> Self {
        Self {
            messages: Vec::new(),
            state: SendState::Idle,
            completed: false,
            completion,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    #[must_use]
    pub fn state(&self) -> SendState {
        self.state
    }

    /// Whether the completion gate is set; gated sends never reach the
    /// backend until a new-conversation action clears it.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn is_input_disabled(&self) -> bool {
        matches!(self.state, SendState::Sending | SendState::Streaming)
    }

    #[must_use]
    pub fn last_assistant(&self) -> Option<&TranscriptMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Attachments on the most recently appended user message; what an
    /// in-flight chat request must carry.
    #[must_use]
    pub fn pending_attachments(&self) -> Vec<AttachedFile> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.attached_files.clone())
            .unwrap_or_default()
    }

    /// Append the user message plus an empty assistant placeholder and
    /// enter `Sending`.
    pub fn begin_send(
        &mut self,
        text: impl Into<String>,
        attached_files: Vec<AttachedFile>,
    ) -> Result<(), TranscriptError> {
        if self.is_input_disabled() {
            return Err(TranscriptError::SendInProgress);
        }

        self.messages
            .push(TranscriptMessage::user(text, attached_files));
        self.messages.push(TranscriptMessage::assistant_placeholder());
        self.state = SendState::Sending;
        Ok(())
    }

    /// Replace the last message with the decoder's latest snapshot.
    ///
    /// Only the last position may change while streaming. Snapshots
    /// shorter than the rendered content are ignored so content never
    /// shrinks mid-stream.
    pub fn apply_stream_snapshot(&mut self, snapshot: &str) {
        if !matches!(self.state, SendState::Sending | SendState::Streaming) {
            return;
        }

        self.state = SendState::Streaming;
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant && snapshot.len() >= last.content.len() {
                last.content = snapshot.to_string();
            }
        }
    }

    /// Settle a finished stream. Empty accumulated content is replaced
    /// with the fallback notice; returns true when that substitution
    /// happened so the caller can record the anomaly.
    pub fn settle_success(&mut self, server_message_id: Option<String>) -> bool {
        if matches!(self.state, SendState::Idle) {
            return false;
        }

        let mut substituted = false;
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                if last.content.is_empty() {
                    last.content = EMPTY_RESPONSE_NOTICE.to_string();
                    substituted = true;
                }
                if server_message_id.is_some() {
                    last.server_message_id = server_message_id;
                }
            }
        }

        let concluded = self
            .last_assistant()
            .is_some_and(|last| self.completion.is_complete(&last.content));
        if concluded {
            self.completed = true;
        }

        self.state = SendState::Settled;
        substituted
    }

    /// Settle a failed or aborted stream with a user-facing notice. The
    /// placeholder is never left empty and the state never sticks in
    /// `Streaming`.
    pub fn settle_error(&mut self, notice: &str) {
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                last.content = notice.to_string();
            }
        }
        self.state = SendState::Settled;
    }

    /// Truncate-then-resend: drop everything from `index` on, then
    /// append a new user message plus a fresh assistant placeholder.
    ///
    /// `attached_files: None` carries over the edited message's
    /// attachment set unchanged.
    pub fn edit_and_resend(
        &mut self,
        index: usize,
        text: impl Into<String>,
        attached_files: Option<Vec<AttachedFile>>,
    ) -> Result<EditDirective, TranscriptError> {
        if self.is_input_disabled() {
            return Err(TranscriptError::SendInProgress);
        }

        let target = self
            .messages
            .get(index)
            .ok_or(TranscriptError::InvalidEditTarget(index))?;
        if target.role != Role::User {
            return Err(TranscriptError::InvalidEditTarget(index));
        }

        let edit_from_message_id = target.server_message_id.clone();
        let carried = attached_files.unwrap_or_else(|| target.attached_files.clone());

        self.messages.truncate(index);
        self.messages.push(TranscriptMessage::user(text, carried));
        self.messages.push(TranscriptMessage::assistant_placeholder());
        self.state = SendState::Sending;

        Ok(EditDirective {
            edit_from_message_id,
        })
    }

    /// Answer a gated send locally: append the user text and the canned
    /// reply without any backend contact.
    pub fn gated_reply(&mut self, text: impl Into<String>) -> &'static str {
        self.messages.push(TranscriptMessage::user(text, Vec::new()));
        self.messages
            .push(TranscriptMessage::assistant(COMPLETED_CONVERSATION_REPLY));
        self.state = SendState::Settled;
        COMPLETED_CONVERSATION_REPLY
    }

    /// Install history fetched from the backend.
    pub fn replace_all(
        &mut self,
        messages: Vec<TranscriptMessage>,
    ) -> Result<(), TranscriptError> {
        if self.is_input_disabled() {
            return Err(TranscriptError::SendInProgress);
        }

        self.messages = messages;
        self.state = SendState::Idle;
        Ok(())
    }

    /// Clear the transcript and the completion gate.
    pub fn new_conversation(&mut self) {
        self.messages.clear();
        self.completed = false;
        self.state = SendState::Idle;
    }
}
