//! # Embeddings
//!
//! Embedding generation and nearest-neighbor lookup for the VDB vocabulary
//! store.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors (OpenAI, or an
//!   offline feature-hashing provider)
//! - **Nearest-Neighbor Engines**: Pluggable [`VectorIndex`] implementations
//!   addressed by integer ids
//! - **Caching**: Avoid re-embedding the same text twice
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex                │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  OpenAI/Hashing      cosine / L2      FlatIndex                 │
//! │       │                                                         │
//! │       └──► CachedProvider (EmbeddingCache)                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::{DistanceMetric, FlatIndex, Neighbor, VectorIndex};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use similarity::{cosine_similarity, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
