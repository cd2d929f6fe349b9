//! Error types for the layout engine.
//!
//! Per-note failures never surface here: they are recorded in
//! [`Diagnostics`](crate::diagnostics::Diagnostics) and layout continues.
//! Only stream- and pass-level problems become a [`LayoutError`].

use crate::model::{NoteId, StreamId};

/// Failures reported by a [`NotationBackend`](crate::renderer::backend::NotationBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid duration code '{0}'")]
    InvalidDuration(String),

    #[error("invalid pitch: {0}")]
    InvalidPitch(String),

    #[error("unknown key signature '{0}'")]
    InvalidKey(String),

    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },

    #[error("voice holds {ticks} ticks but only {capacity} fit")]
    VoiceOverflow { ticks: u64, capacity: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// Lyric layout reached an element that has no duration to split.
    #[error("element {index} of {stream} has no duration")]
    MissingDuration { stream: StreamId, index: usize },

    /// The same note appears twice in one stream tree (e.g. via `duplicate()`).
    #[error("{0} appears more than once in the stream")]
    DuplicateNote(NoteId),

    #[error("{0} appears more than once in the stream")]
    DuplicateStream(StreamId),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
