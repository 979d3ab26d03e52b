//! Transport-only chat backend client primitives.
//!
//! This crate owns request building, response parsing, and the
//! line-delimited frame stream decoder for the chat backend endpoints
//! only. It intentionally contains no session policy: which session is
//! active, when to create one, and how to recover from rejection live in
//! the consuming core.
//!
//! Frame decoding is tolerant by contract: undecodable lines become
//! typed [`FrameOutcome::Skipped`] values rather than stream failures,
//! and skip counts are observable for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod stream;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient, StreamOutcome};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{StreamAccumulator, StreamEvent};
pub use payload::{
    AttachedFile, ChatRequest, MessageMetadata, MessageRecord, SessionHandshake, SessionSummary,
};
pub use stream::{FrameOutcome, FrameStreamParser, SkipReason};
pub use url::normalize_base_url;

pub use reqwest::StatusCode;
