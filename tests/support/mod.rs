use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chat_api::{
    CancellationSignal, ChatApiError, ChatRequest, MessageRecord, SessionHandshake,
    SessionSummary, StreamAccumulator, StreamEvent, StreamOutcome,
};
use chat_api::StatusCode;
use parley::ChatBackend;

/// Scriptable failure shapes the mock can replay.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Status(u16, String),
    UserNotFound(String),
    SessionInvalid(String),
    Cancelled,
}

impl MockFailure {
    fn into_error(self) -> ChatApiError {
        match self {
            Self::Status(code, message) => ChatApiError::Status(
                StatusCode::from_u16(code).expect("valid scripted status code"),
                message,
            ),
            Self::UserNotFound(message) => ChatApiError::UserNotFound(message),
            Self::SessionInvalid(session_id) => ChatApiError::SessionInvalid {
                status: StatusCode::FORBIDDEN,
                session_id,
            },
            Self::Cancelled => ChatApiError::Cancelled,
        }
    }
}

/// One scripted chat stream.
#[derive(Debug, Clone)]
pub enum StreamScript {
    Frames(Vec<StreamEvent>),
    Failure(MockFailure),
}

/// Trace-recording fake backend; scripts are consumed FIFO and default
/// to benign responses when exhausted.
#[derive(Default)]
pub struct MockChat {
    pub create_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub recent_calls: AtomicUsize,
    pub messages_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub stream_requests: Mutex<Vec<ChatRequest>>,
    create_delay: Option<Duration>,
    create_script: Mutex<VecDeque<Result<SessionHandshake, MockFailure>>>,
    recent_script: Mutex<VecDeque<Result<Vec<SessionSummary>, MockFailure>>>,
    messages_script: Mutex<VecDeque<Result<Vec<MessageRecord>, MockFailure>>>,
    stream_script: Mutex<VecDeque<StreamScript>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold session creation open long enough for concurrent callers to
    /// observe the in-flight flag.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn push_create(&self, result: Result<SessionHandshake, MockFailure>) {
        lock_unpoisoned(&self.create_script).push_back(result);
    }

    pub fn push_recent(&self, result: Result<Vec<SessionSummary>, MockFailure>) {
        lock_unpoisoned(&self.recent_script).push_back(result);
    }

    pub fn push_messages(&self, result: Result<Vec<MessageRecord>, MockFailure>) {
        lock_unpoisoned(&self.messages_script).push_back(result);
    }

    pub fn push_stream(&self, script: StreamScript) {
        lock_unpoisoned(&self.stream_script).push_back(script);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Acquire)
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::Acquire)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::Acquire)
    }

    pub fn last_stream_request(&self) -> Option<ChatRequest> {
        lock_unpoisoned(&self.stream_requests).last().cloned()
    }
}

pub fn handshake(session_id: &str, user_id: &str) -> SessionHandshake {
    SessionHandshake {
        success: true,
        session_id: session_id.to_string(),
        is_authenticated: true,
        user_id: Some(user_id.to_string()),
    }
}

pub fn summary(session_id: &str) -> SessionSummary {
    SessionSummary {
        session_id: session_id.to_string(),
        last_message_at: Some("2026-03-01T10:00:00Z".to_string()),
        title: None,
    }
}

pub fn user_record(message_id: &str, content: &str) -> MessageRecord {
    MessageRecord {
        role: "user".to_string(),
        content: content.to_string(),
        created_at: Some("2026-03-01T10:00:00Z".to_string()),
        message_id: Some(message_id.to_string()),
        metadata: Default::default(),
    }
}

pub fn assistant_record(message_id: &str, content: &str) -> MessageRecord {
    MessageRecord {
        role: "assistant".to_string(),
        content: content.to_string(),
        created_at: Some("2026-03-01T10:00:05Z".to_string()),
        message_id: Some(message_id.to_string()),
        metadata: Default::default(),
    }
}

pub fn content_frame(text: &str, done: bool) -> StreamEvent {
    StreamEvent::Content {
        content: text.to_string(),
        done,
    }
}

pub fn metadata_frame(session_id: &str, message_id: Option<&str>) -> StreamEvent {
    StreamEvent::Metadata {
        session_id: Some(session_id.to_string()),
        message_id: message_id.map(ToString::to_string),
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    async fn create_session(
        &self,
        _session_id: Option<&str>,
    ) -> Result<SessionHandshake, ChatApiError> {
        self.create_calls.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock_unpoisoned(&self.create_script).pop_front();
        match scripted {
            Some(Ok(handshake)) => Ok(handshake),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(handshake("session-created", "user-1")),
        }
    }

    async fn register_user(&self, _user_id: &str) -> Result<(), ChatApiError> {
        self.register_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn recent_sessions(&self, _limit: u32) -> Result<Vec<SessionSummary>, ChatApiError> {
        self.recent_calls.fetch_add(1, Ordering::AcqRel);

        let scripted = lock_unpoisoned(&self.recent_script).pop_front();
        match scripted {
            Some(Ok(sessions)) => Ok(sessions),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_messages(
        &self,
        _session_id: &str,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<MessageRecord>, ChatApiError> {
        self.messages_calls.fetch_add(1, Ordering::AcqRel);

        let scripted = lock_unpoisoned(&self.messages_script).pop_front();
        match scripted {
            Some(Ok(messages)) => Ok(messages),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_session(&self, _session_id: &str) -> Result<(), ChatApiError> {
        self.delete_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        _cancellation: Option<&CancellationSignal>,
        on_event: &mut (dyn for<'a, 'b> FnMut(&'a StreamEvent, &'b StreamAccumulator) + Send),
    ) -> Result<StreamOutcome, ChatApiError> {
        self.stream_calls.fetch_add(1, Ordering::AcqRel);
        lock_unpoisoned(&self.stream_requests).push(request.clone());

        let scripted = lock_unpoisoned(&self.stream_script).pop_front();
        let events = match scripted {
            Some(StreamScript::Failure(failure)) => return Err(failure.into_error()),
            Some(StreamScript::Frames(events)) => events,
            None => vec![content_frame("Hello.", true)],
        };

        let mut accumulator = StreamAccumulator::default();
        for event in &events {
            if let StreamEvent::Error { detail } = event {
                return Err(ChatApiError::StreamFailed {
                    detail: detail.clone().unwrap_or_default(),
                });
            }
            accumulator.apply(event);
            on_event(event, &accumulator);
        }

        Ok(StreamOutcome {
            skipped_frames: 0,
            done: accumulator.done,
            content: accumulator.content,
            session_id: accumulator.session_id,
            message_id: accumulator.message_id,
        })
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
