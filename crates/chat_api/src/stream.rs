use serde_json::Value;

use crate::events::StreamEvent;

/// Why a decoded line produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Line carried no `data:` marker.
    MissingPrefix,
    /// Marker present but nothing after it.
    EmptyPayload,
    MalformedJson,
    UnknownType(String),
}

/// Outcome of decoding one frame line.
///
/// Skips are typed rather than silently dropped so consumers and tests
/// can account for them; the stream itself never aborts on a skip.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Event(StreamEvent),
    Skipped(SkipReason),
}

/// Incremental parser for the newline-delimited chat frame stream.
#[derive(Debug, Default)]
pub struct FrameStreamParser {
    buffer: String,
    skipped: usize,
}

impl FrameStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameOutcome> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut outcomes = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].trim_end_matches('\r').to_string();
            self.buffer.drain(0..=split);
            outcomes.push(self.decode(&line));
        }

        outcomes
    }

    /// Drain any unterminated trailing line once the byte stream is
    /// exhausted. Returns `None` when the buffer holds only whitespace.
    pub fn finish(&mut self) -> Option<FrameOutcome> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }

        Some(self.decode(rest))
    }

    /// Parse a complete frame payload string in one shot.
    pub fn parse_lines(input: &str) -> Vec<FrameOutcome> {
        let mut parser = Self::default();
        let mut outcomes = parser.feed(input.as_bytes());
        outcomes.extend(parser.finish());
        outcomes
    }

    /// Number of lines decoded to a [`FrameOutcome::Skipped`] so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    fn decode(&mut self, line: &str) -> FrameOutcome {
        let outcome = decode_line(line);
        if matches!(outcome, FrameOutcome::Skipped(_)) {
            self.skipped += 1;
        }
        outcome
    }
}

/// Collect just the events from a batch of outcomes.
pub fn events_only(outcomes: Vec<FrameOutcome>) -> Vec<StreamEvent> {
    outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            FrameOutcome::Event(event) => Some(event),
            FrameOutcome::Skipped(_) => None,
        })
        .collect()
}

fn decode_line(line: &str) -> FrameOutcome {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return FrameOutcome::Skipped(SkipReason::MissingPrefix);
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return FrameOutcome::Skipped(SkipReason::EmptyPayload);
    }

    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return FrameOutcome::Skipped(SkipReason::MalformedJson);
    };

    map_event(value)
}

fn map_event(value: Value) -> FrameOutcome {
    let Some(event_type) = value.get("type").and_then(Value::as_str) else {
        return FrameOutcome::Skipped(SkipReason::MalformedJson);
    };

    match event_type {
        "content" => {
            let content = value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned();
            let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
            FrameOutcome::Event(StreamEvent::Content { content, done })
        }
        "metadata" => {
            let session_id = value
                .get("session_id")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            let message_id = value
                .get("message_id")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            FrameOutcome::Event(StreamEvent::Metadata {
                session_id,
                message_id,
            })
        }
        "error" => {
            let detail = value
                .get("detail")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            FrameOutcome::Event(StreamEvent::Error { detail })
        }
        other => FrameOutcome::Skipped(SkipReason::UnknownType(other.to_owned())),
    }
}
