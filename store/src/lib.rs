//! # Vocabulary Store
//!
//! An embedding-backed store of text "word-units". Callers register text,
//! look up the most similar stored unit for a query, and ask how confident
//! the store is that a query is already represented.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        VocabStore                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   text ──► EmbeddingProvider ──► vector                         │
//! │                                    │                            │
//! │   ┌──────────────┐          ┌──────▼───────┐                    │
//! │   │  Vocabulary  │◄─ id ───►│ VectorIndex  │                    │
//! │   │ (positions)  │          │ (stable ids) │                    │
//! │   └──────┬───────┘          └──────┬───────┘                    │
//! │          └────────────┬────────────┘                            │
//! │                       ▼                                         │
//! │             .mmp  +  .idm artifacts                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vdb_store::{StoreConfig, VocabStore};
//!
//! let mut store = VocabStore::from_config(StoreConfig::default()).await?;
//! store.add("Hello world!").await?;
//! let score = store.confidence_score("Hello, world").await?;
//! store.save(None).await?;
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod store;

pub use config::{EmbeddingConfig, EmbeddingProviderType, StoreConfig};
pub use error::{Result, StoreError};
pub use persistence::{ArtifactPaths, VocabularySnapshot};
pub use store::{
    Confidence, EntrySelector, SharedVocabStore, SimilarEntry, VocabStore, VocabularyEntry,
};

// Re-export from dependencies for convenience
pub use vdb_embeddings::{DistanceMetric, EmbeddingProvider, FlatIndex, VectorIndex};
