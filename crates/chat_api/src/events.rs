use serde::{Deserialize, Serialize};

/// Stream event decoded from one chat frame after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text; `done` marks the terminal frame.
    Content {
        #[serde(default)]
        content: String,
        #[serde(default)]
        done: bool,
    },
    /// Authoritative session identity for this exchange. May arrive
    /// before, between, or after content frames.
    Metadata {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Error {
        #[serde(default)]
        detail: Option<String>,
    },
}

/// Folds decoded events into the running assistant snapshot.
///
/// `content` only ever grows until the stream is done; metadata capture
/// is independent of content accumulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamAccumulator {
    pub content: String,
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub done: bool,
}

impl StreamAccumulator {
    /// Applies one event; returns true when the rendered snapshot changed.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Content { content, done } => {
                self.content.push_str(content);
                if *done {
                    self.done = true;
                }
                !content.is_empty()
            }
            StreamEvent::Metadata {
                session_id,
                message_id,
            } => {
                if session_id.is_some() {
                    self.session_id = session_id.clone();
                }
                if message_id.is_some() {
                    self.message_id = message_id.clone();
                }
                false
            }
            StreamEvent::Error { .. } => false,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{StreamAccumulator, StreamEvent};

    #[test]
    fn accumulator_concatenates_content_and_tracks_done() {
        let mut accumulator = StreamAccumulator::default();

        assert!(accumulator.apply(&StreamEvent::Content {
            content: "Hi".to_string(),
            done: false,
        }));
        assert!(accumulator.apply(&StreamEvent::Content {
            content: " there".to_string(),
            done: true,
        }));

        assert_eq!(accumulator.snapshot(), "Hi there");
        assert!(accumulator.done);
    }

    #[test]
    fn accumulator_captures_metadata_independently_of_content() {
        let mut accumulator = StreamAccumulator::default();

        let changed = accumulator.apply(&StreamEvent::Metadata {
            session_id: Some("session-9".to_string()),
            message_id: Some("message-3".to_string()),
        });

        assert!(!changed);
        assert_eq!(accumulator.session_id.as_deref(), Some("session-9"));
        assert_eq!(accumulator.message_id.as_deref(), Some("message-3"));
        assert!(accumulator.is_empty());
    }

    #[test]
    fn accumulator_keeps_last_known_ids_across_sparse_metadata() {
        let mut accumulator = StreamAccumulator::default();

        accumulator.apply(&StreamEvent::Metadata {
            session_id: Some("session-9".to_string()),
            message_id: None,
        });
        accumulator.apply(&StreamEvent::Metadata {
            session_id: None,
            message_id: Some("message-3".to_string()),
        });

        assert_eq!(accumulator.session_id.as_deref(), Some("session-9"));
        assert_eq!(accumulator.message_id.as_deref(), Some("message-3"));
    }
}
