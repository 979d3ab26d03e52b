use async_trait::async_trait;

use chat_api::{
    CancellationSignal, ChatApiClient, ChatApiError, ChatRequest, MessageRecord, SessionHandshake,
    SessionSummary, StreamAccumulator, StreamEvent, StreamOutcome,
};

/// Object-safe seam over the backend REST/stream surface.
///
/// The core is written against this trait so resolution, recovery, and
/// streaming behavior can be exercised without a live transport.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<SessionHandshake, ChatApiError>;

    async fn register_user(&self, user_id: &str) -> Result<(), ChatApiError>;

    async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, ChatApiError>;

    async fn fetch_messages(
        &self,
        session_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, ChatApiError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), ChatApiError>;

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_event: &mut (dyn for<'a, 'b> FnMut(&'a StreamEvent, &'b StreamAccumulator) + Send),
    ) -> Result<StreamOutcome, ChatApiError>;
}

#[async_trait]
impl ChatBackend for ChatApiClient {
    async fn create_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<SessionHandshake, ChatApiError> {
        ChatApiClient::create_session(self, session_id).await
    }

    async fn register_user(&self, user_id: &str) -> Result<(), ChatApiError> {
        ChatApiClient::register_user(self, user_id).await
    }

    async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, ChatApiError> {
        ChatApiClient::recent_sessions(self, limit).await
    }

    async fn fetch_messages(
        &self,
        session_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, ChatApiError> {
        ChatApiClient::fetch_messages(self, session_id, limit, offset).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ChatApiError> {
        ChatApiClient::delete_session(self, session_id).await
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_event: &mut (dyn for<'a, 'b> FnMut(&'a StreamEvent, &'b StreamAccumulator) + Send),
    ) -> Result<StreamOutcome, ChatApiError> {
        ChatApiClient::stream_chat(self, request, cancellation, |event, accumulator| {
            on_event(event, accumulator);
        })
        .await
    }
}
