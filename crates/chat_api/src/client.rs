use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::ChatApiConfig;
use crate::error::{body_indicates_missing_user, parse_error_message, ChatApiError};
use crate::events::{StreamAccumulator, StreamEvent};
use crate::headers::{build_headers, HEADER_ACCEPT};
use crate::payload::{
    ChatRequest, MessageRecord, MessagesResponse, RegisterRequest, SessionHandshake,
    SessionListResponse, SessionRequest, SessionSummary,
};
use crate::stream::{FrameOutcome, FrameStreamParser};
use crate::url::{
    chat_url, session_detail_url, session_messages_url, session_url, sessions_url, users_url,
};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

/// Final state of one consumed chat stream.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub content: String,
    /// Authoritative session id from the metadata frame, when present.
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    /// True when a content frame carried an explicit `done` flag.
    pub done: bool,
    pub skipped_frames: usize,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    fn header_map(&self, session_id: Option<&str>) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, session_id);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    /// `POST /session`: create or restore a session for the current
    /// identity. 400/404 bodies naming an unknown owning user map to
    /// [`ChatApiError::UserNotFound`] so the caller can run the
    /// corrective registration path.
    pub async fn create_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<SessionHandshake, ChatApiError> {
        let headers = self.header_map(session_id)?;
        let body = SessionRequest {
            session_id: session_id.map(str::to_owned),
        };
        let response = self
            .http
            .post(session_url(&self.config.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<SessionHandshake>()
                .await
                .map_err(ChatApiError::from);
        }

        let body = response.text().await.unwrap_or_default();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND)
            && body_indicates_missing_user(&body)
        {
            return Err(ChatApiError::UserNotFound(parse_error_message(
                status, &body,
            )));
        }

        Err(ChatApiError::Status(status, parse_error_message(status, &body)))
    }

    /// `POST /users`: corrective re-registration of the owning user.
    pub async fn register_user(&self, user_id: &str) -> Result<(), ChatApiError> {
        let headers = self.header_map(None)?;
        let body = RegisterRequest {
            user_id: user_id.to_owned(),
        };
        let response = self
            .http
            .post(users_url(&self.config.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(ChatApiError::from)?;

        error_for_status(response).await.map(|_| ())
    }

    /// `GET /sessions?limit=N`: most recent sessions first.
    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, ChatApiError> {
        let headers = self.header_map(None)?;
        let response = self
            .http
            .get(sessions_url(&self.config.base_url, limit))
            .headers(headers)
            .send()
            .await
            .map_err(ChatApiError::from)?;

        let response = error_for_status(response).await?;
        let listing = response
            .json::<SessionListResponse>()
            .await
            .map_err(ChatApiError::from)?;
        Ok(listing.sessions)
    }

    /// `GET /sessions/{id}/messages`: 403/404 map to
    /// [`ChatApiError::SessionInvalid`] so the caller can clear local
    /// state and re-resolve.
    pub async fn fetch_messages(
        &self,
        session_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, ChatApiError> {
        let headers = self.header_map(Some(session_id))?;
        let response = self
            .http
            .get(session_messages_url(
                &self.config.base_url,
                session_id,
                limit,
                offset,
            ))
            .headers(headers)
            .send()
            .await
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::NOT_FOUND) {
            return Err(ChatApiError::SessionInvalid {
                status,
                session_id: session_id.to_owned(),
            });
        }

        let response = error_for_status(response).await?;
        let listing = response
            .json::<MessagesResponse>()
            .await
            .map_err(ChatApiError::from)?;
        Ok(listing.messages)
    }

    /// `DELETE /sessions/{id}`.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ChatApiError> {
        let headers = self.header_map(Some(session_id))?;
        let response = self
            .http
            .delete(session_detail_url(&self.config.base_url, session_id))
            .headers(headers)
            .send()
            .await
            .map_err(ChatApiError::from)?;

        error_for_status(response).await.map(|_| ())
    }

    /// `POST /chat`: consume the frame stream, folding events into an
    /// accumulator and invoking `on_event` after each decoded event.
    ///
    /// The chat call itself is never retried; transport failures and
    /// explicit error frames surface as errors for the caller to settle.
    pub async fn stream_chat<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<StreamOutcome, ChatApiError>
    where
        F: FnMut(&StreamEvent, &StreamAccumulator),
    {
        let mut headers = self.header_map(Some(&request.session_id))?;
        headers.insert(
            HeaderName::from_static(HEADER_ACCEPT),
            HeaderValue::from_static("text/event-stream"),
        );

        let response = self
            .http
            .post(chat_url(&self.config.base_url))
            .headers(headers)
            .json(request);
        let response = await_or_cancel(response.send(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            return Err(ChatApiError::Status(status, parse_error_message(status, &body)));
        }

        let mut bytes = response.bytes_stream();
        let mut parser = FrameStreamParser::default();
        let mut accumulator = StreamAccumulator::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            let chunk = chunk.map_err(ChatApiError::from)?;
            for outcome in parser.feed(&chunk) {
                apply_outcome(outcome, &mut accumulator, &mut on_event)?;
                if accumulator.done {
                    break;
                }
            }
            if accumulator.done {
                break;
            }
        }

        if !accumulator.done {
            if let Some(outcome) = parser.finish() {
                apply_outcome(outcome, &mut accumulator, &mut on_event)?;
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        Ok(StreamOutcome {
            skipped_frames: parser.skipped(),
            done: accumulator.done,
            content: accumulator.content,
            session_id: accumulator.session_id,
            message_id: accumulator.message_id,
        })
    }
}

fn apply_outcome<F>(
    outcome: FrameOutcome,
    accumulator: &mut StreamAccumulator,
    on_event: &mut F,
) -> Result<(), ChatApiError>
where
    F: FnMut(&StreamEvent, &StreamAccumulator),
{
    let event = match outcome {
        FrameOutcome::Event(event) => event,
        FrameOutcome::Skipped(reason) => {
            tracing::debug!(?reason, "dropped undecodable stream frame");
            return Ok(());
        }
    };

    if let StreamEvent::Error { detail } = &event {
        return Err(ChatApiError::StreamFailed {
            detail: detail
                .clone()
                .unwrap_or_else(|| "backend reported a stream error".to_owned()),
        });
    }

    accumulator.apply(&event);
    on_event(&event, accumulator);
    Ok(())
}

async fn error_for_status(response: Response) -> Result<Response, ChatApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ChatApiError::Status(status, parse_error_message(status, &body)))
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{StreamAccumulator, StreamEvent};
    use crate::stream::{FrameOutcome, FrameStreamParser};

    use super::apply_outcome;

    fn feed_all(
        payload: &str,
        accumulator: &mut StreamAccumulator,
        observed: &mut Vec<StreamEvent>,
    ) -> Result<(), crate::ChatApiError> {
        for outcome in FrameStreamParser::parse_lines(payload) {
            apply_outcome(outcome, accumulator, &mut |event, _| {
                observed.push(event.clone());
            })?;
        }
        Ok(())
    }

    #[test]
    fn apply_outcome_folds_content_in_receipt_order() {
        let payload = concat!(
            "data: {\"type\":\"content\",\"content\":\"Hi\",\"done\":false}\n",
            "data: {\"type\":\"metadata\",\"session_id\":\"session-1\"}\n",
            "data: {\"type\":\"content\",\"content\":\" there\",\"done\":true}\n",
        );

        let mut accumulator = StreamAccumulator::default();
        let mut observed = Vec::new();
        feed_all(payload, &mut accumulator, &mut observed).expect("stream should fold");

        assert_eq!(accumulator.content, "Hi there");
        assert_eq!(accumulator.session_id.as_deref(), Some("session-1"));
        assert!(accumulator.done);
        assert_eq!(observed.len(), 3);
    }

    #[test]
    fn apply_outcome_surfaces_error_frames_as_stream_failure() {
        let payload = "data: {\"type\":\"error\",\"detail\":\"backend exploded\"}\n";

        let mut accumulator = StreamAccumulator::default();
        let mut observed = Vec::new();
        let error = feed_all(payload, &mut accumulator, &mut observed)
            .expect_err("error frame should fail the stream");

        assert!(matches!(error, crate::ChatApiError::StreamFailed { .. }));
        assert!(observed.is_empty());
    }

    #[test]
    fn apply_outcome_ignores_skips_without_failing() {
        let payload = concat!(
            ": keepalive\n",
            "data: {broken\n",
            "data: {\"type\":\"content\",\"content\":\"ok\",\"done\":true}\n",
        );

        let mut accumulator = StreamAccumulator::default();
        let mut observed = Vec::new();
        feed_all(payload, &mut accumulator, &mut observed).expect("skips should not fail");

        assert_eq!(accumulator.content, "ok");
        assert_eq!(observed.len(), 1);
    }
}
