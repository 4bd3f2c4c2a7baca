//! Error types for the vocabulary store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the vocabulary store.
///
/// None of them leave the store half-mutated: a failed operation keeps the
/// vocabulary and the index exactly as they were.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The provider could not embed the text, or the engine rejected the vector.
    #[error("embedding error: {0}")]
    Embedding(#[from] vdb_embeddings::EmbeddingError),

    /// Position outside `[0, len)`.
    #[error("position {position} out of range for vocabulary of {len} entries")]
    OutOfRange { position: usize, len: usize },

    /// Text selector not present in the vocabulary.
    #[error("entry not found: {0:?}")]
    NotFound(String),

    /// Similarity queried against an empty vocabulary.
    #[error("vocabulary is empty")]
    EmptyStore,

    /// The index answered with an id no vocabulary entry owns.
    #[error("index returned unknown id {id}; rebuild it with reset_index")]
    IndexDrift { id: u64 },

    /// Every stable id has been handed out; `reset_index` renumbers from zero.
    #[error("stable ids exhausted; rebuild the index with reset_index")]
    IdsExhausted,

    /// Artifact could not be written, read or validated.
    #[error("persistence error at {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
