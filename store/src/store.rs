//! The vocabulary store.
//!
//! [`VocabStore`] owns an ordered list of text entries and a nearest-neighbor
//! engine holding one vector per entry. Every public mutator updates both
//! before returning, so `vocabulary.len() == index.len()` holds between
//! calls.
//!
//! Entries are addressed by position. Internally each entry also carries a
//! stable id handed to the engine, so removing an entry never depends on a
//! similarity search finding the right duplicate.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vdb_embeddings::{
    Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest, FlatIndex, VectorIndex,
    cosine_similarity,
};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::persistence::{
    ArtifactPaths, FORMAT_VERSION, VocabularySnapshot, digest, read_artifact, write_artifacts,
};

/// A store shared between tasks. The lock is held for a whole operation.
pub type SharedVocabStore<I = FlatIndex> = Arc<Mutex<VocabStore<I>>>;

/// One word-unit in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Stable id the entry's vector is stored under.
    pub id: u64,

    /// The text itself.
    pub text: String,
}

/// Selects an entry for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySelector {
    /// Position in the vocabulary.
    Position(usize),
    /// First entry whose text matches exactly.
    Text(String),
}

impl From<usize> for EntrySelector {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl From<&str> for EntrySelector {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for EntrySelector {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Result of [`VocabStore::confidence`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    /// Raw cosine similarity to the nearest entry.
    Score(f32),
    /// Whether the similarity strictly exceeded the threshold.
    Present(bool),
}

impl Confidence {
    /// The raw score, if this is a [`Confidence::Score`].
    pub fn score(self) -> Option<f32> {
        match self {
            Self::Score(score) => Some(score),
            Self::Present(_) => None,
        }
    }

    /// The verdict, if this is a [`Confidence::Present`].
    pub fn present(self) -> Option<bool> {
        match self {
            Self::Score(_) => None,
            Self::Present(present) => Some(present),
        }
    }
}

/// A neighbour returned by [`VocabStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEntry {
    /// Position in the vocabulary.
    pub position: usize,

    /// The entry's text.
    pub text: String,

    /// Distance under the engine's metric.
    pub distance: f32,
}

/// Embedding-backed vocabulary with similarity lookup and confidence scoring.
pub struct VocabStore<I = FlatIndex> {
    /// Configuration.
    config: StoreConfig,

    /// Shared embedding provider.
    provider: Arc<dyn EmbeddingProvider>,

    /// Entries in insertion order.
    entries: Vec<VocabularyEntry>,

    /// Stable id -> position in `entries`.
    positions: HashMap<u64, usize>,

    /// Nearest-neighbor engine, one vector per entry.
    index: I,

    /// Next stable id to hand out.
    next_id: u64,

    /// Dimensionality learned from the provider.
    dimension: usize,
}

impl VocabStore<FlatIndex> {
    /// Create an empty store backed by a [`FlatIndex`].
    pub async fn new(config: StoreConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::with_engine(config, provider).await
    }

    /// Build the configured provider and create an empty store.
    pub async fn from_config(config: StoreConfig) -> Result<Self> {
        let provider = config.embedding.build_provider()?;
        Self::new(config, provider).await
    }
}

impl<I: VectorIndex> VocabStore<I> {
    /// Create an empty store backed by engine `I`.
    ///
    /// The probe text is embedded once; the length of that vector fixes the
    /// store's dimensionality.
    pub async fn with_engine(
        config: StoreConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let probe = provider
            .embed(EmbeddingRequest::new(config.probe_text.clone()))
            .await?;
        let dimension = probe.embedding.len();
        if dimension == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty embedding".to_string(),
            )
            .into());
        }

        info!(
            "Created vocabulary store ({} / {}, {dimension} dimensions)",
            provider.name(),
            provider.default_model()
        );

        Ok(Self {
            index: I::empty(dimension, config.metric),
            config,
            provider,
            entries: Vec::new(),
            positions: HashMap::new(),
            next_id: 0,
            dimension,
        })
    }

    /// Wrap the store for shared use behind one exclusive lock.
    pub fn into_shared(self) -> SharedVocabStore<I> {
        Arc::new(Mutex::new(self))
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Dimensionality of every stored vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Read-only view of the engine.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in vocabulary order.
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// Texts in vocabulary order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.text.as_str())
    }

    /// Position of the first entry equal to `text`.
    pub fn position_of(&self, text: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.text == text)
    }

    /// Text at `position`.
    pub fn fetch(&self, position: usize) -> Result<&str> {
        self.entries
            .get(position)
            .map(|e| e.text.as_str())
            .ok_or(StoreError::OutOfRange {
                position,
                len: self.entries.len(),
            })
    }

    /// Append `text`, returning its position.
    ///
    /// Nothing changes if embedding fails.
    pub async fn add(&mut self, text: impl Into<String>) -> Result<usize> {
        let text = text.into();
        let embedding = self.embed(&text).await?;

        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        self.index.add(id, embedding)?;
        self.next_id = next_id;

        let position = self.entries.len();
        self.positions.insert(id, position);
        self.entries.push(VocabularyEntry { id, text });

        debug!("Added entry {id} at position {position}");
        Ok(position)
    }

    /// Append several texts, returning their positions.
    ///
    /// Either every text is added or none is.
    pub async fn add_batch<S>(&mut self, texts: impl IntoIterator<Item = S>) -> Result<Range<usize>>
    where
        S: Into<String>,
    {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        let embeddings = self.embed_all(texts.iter().map(String::as_str)).await?;

        let start = self.entries.len();
        let first_id = self.next_id;
        for (text, embedding) in texts.into_iter().zip(embeddings) {
            let id = self.next_id;
            let added = match id.checked_add(1) {
                Some(next_id) => self
                    .index
                    .add(id, embedding)
                    .map(|()| next_id)
                    .map_err(StoreError::from),
                None => Err(StoreError::IdsExhausted),
            };
            match added {
                Ok(next_id) => self.next_id = next_id,
                Err(e) => {
                    self.rollback(start, first_id);
                    return Err(e);
                }
            }
            self.positions.insert(id, self.entries.len());
            self.entries.push(VocabularyEntry { id, text });
        }

        let end = self.entries.len();
        info!("Added {} entries", end - start);
        Ok(start..end)
    }

    /// Undo a partially applied batch: drop entries from `start` and ids from `first_id`.
    fn rollback(&mut self, start: usize, first_id: u64) {
        let added: Vec<u64> = (first_id..self.next_id).collect();
        self.index.remove_ids(&added);
        for entry in self.entries.drain(start..) {
            self.positions.remove(&entry.id);
        }
        self.next_id = first_id;
    }

    /// Remove an entry, returning its text. Later positions shift down by one.
    pub fn remove(&mut self, selector: impl Into<EntrySelector>) -> Result<String> {
        let position = match selector.into() {
            EntrySelector::Position(position) => {
                if position >= self.entries.len() {
                    return Err(StoreError::OutOfRange {
                        position,
                        len: self.entries.len(),
                    });
                }
                position
            }
            EntrySelector::Text(text) => self
                .position_of(&text)
                .ok_or(StoreError::NotFound(text))?,
        };

        let entry = self.entries.remove(position);
        if self.index.remove_ids(&[entry.id]) == 0 {
            warn!(
                "Index held no vector for entry {} ({:?}); reset_index will repair it",
                entry.id, entry.text
            );
        }

        self.positions.remove(&entry.id);
        for (offset, e) in self.entries[position..].iter().enumerate() {
            self.positions.insert(e.id, position + offset);
        }

        debug!("Removed entry {} from position {position}", entry.id);
        Ok(entry.text)
    }

    /// Rebuild the index from the vocabulary.
    ///
    /// Every entry is re-embedded in order and ids are renumbered to match
    /// positions. If embedding fails the previous index is kept.
    pub async fn reset_index(&mut self) -> Result<()> {
        let embeddings = self
            .embed_all(self.entries.iter().map(|e| e.text.as_str()))
            .await?;

        self.index.reset();
        for (position, (entry, embedding)) in self.entries.iter_mut().zip(embeddings).enumerate() {
            entry.id = position as u64;
            self.index.add(entry.id, embedding)?;
        }

        self.next_id = self.entries.len() as u64;
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, e)| (e.id, position))
            .collect();

        info!("Rebuilt index with {} entries", self.entries.len());
        Ok(())
    }

    /// Position of the entry nearest to `text`.
    pub async fn similar(&self, text: &str) -> Result<usize> {
        self.ensure_not_empty()?;
        let query = self.embed(text).await?;
        self.nearest(&query)
    }

    /// Text of the entry nearest to `text`.
    pub async fn similar_text(&self, text: &str) -> Result<&str> {
        let position = self.similar(text).await?;
        self.fetch(position)
    }

    /// The `k` entries nearest to `text`, nearest first.
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<SimilarEntry>> {
        self.ensure_not_empty()?;
        let query = self.embed(text).await?;

        self.index
            .search(&query, k)?
            .into_iter()
            .map(|neighbor| -> Result<SimilarEntry> {
                let position = self.position_for(neighbor.id)?;
                Ok(SimilarEntry {
                    position,
                    text: self.entries[position].text.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect()
    }

    /// Cosine similarity between `text` and its nearest entry.
    ///
    /// The nearest entry is re-embedded and compared directly, independent of
    /// the metric the engine ranks by.
    pub async fn confidence_score(&self, text: &str) -> Result<f32> {
        self.ensure_not_empty()?;
        let query = self.embed(text).await?;
        let position = self.nearest(&query)?;
        let stored = self.embed(&self.entries[position].text).await?;
        Ok(cosine_similarity(&query, &stored)?)
    }

    /// Confidence that `text` is already represented.
    ///
    /// With `exact` the raw similarity is returned; otherwise whether it
    /// strictly exceeds `threshold`.
    pub async fn confidence(&self, text: &str, exact: bool, threshold: f32) -> Result<Confidence> {
        let score = self.confidence_score(text).await?;
        Ok(if exact {
            Confidence::Score(score)
        } else {
            Confidence::Present(score > threshold)
        })
    }

    /// Whether `text` clears the configured confidence threshold.
    pub async fn is_present(&self, text: &str) -> Result<bool> {
        let score = self.confidence_score(text).await?;
        Ok(score > self.config.confidence_threshold)
    }

    /// Write both artifacts. `target` names a base path whose extension is
    /// replaced per artifact; `None` uses the configured paths.
    ///
    /// If either write fails neither artifact on disk is replaced.
    pub async fn save(&self, target: Option<&Path>) -> Result<ArtifactPaths> {
        let paths = ArtifactPaths::resolve(target, &self.config);

        let index_bytes = self
            .index
            .snapshot()
            .map_err(|e| StoreError::persistence(&paths.index, e))?;
        let snapshot = VocabularySnapshot {
            format_version: FORMAT_VERSION,
            model: self.provider.default_model().to_string(),
            dimension: self.dimension,
            next_id: self.next_id,
            saved_at: Utc::now(),
            index_digest: digest(&index_bytes),
            entries: self.entries.clone(),
        };
        let vocab_bytes = snapshot.encode(&paths.vocab)?;

        write_artifacts(&[
            (paths.index.as_path(), index_bytes.as_slice()),
            (paths.vocab.as_path(), vocab_bytes.as_slice()),
        ])
        .await?;

        info!(
            "Saved {} entries to {} and {}",
            self.entries.len(),
            paths.vocab.display(),
            paths.index.display()
        );
        Ok(paths)
    }

    /// Replace the in-memory state with a saved snapshot.
    ///
    /// Both artifacts are read and cross-checked before anything is
    /// replaced; on error the store is unchanged.
    pub async fn try_load(&mut self, target: Option<&Path>) -> Result<()> {
        let paths = ArtifactPaths::resolve(target, &self.config);

        let vocab_bytes = read_artifact(&paths.vocab).await?;
        let index_bytes = read_artifact(&paths.index).await?;

        let snapshot = VocabularySnapshot::decode(&paths.vocab, &vocab_bytes)?;
        if snapshot.index_digest != digest(&index_bytes) {
            return Err(StoreError::persistence(
                &paths.index,
                format!(
                    "index does not belong to the vocabulary in {}",
                    paths.vocab.display()
                ),
            ));
        }
        let index = I::restore(&index_bytes).map_err(|e| StoreError::persistence(&paths.index, e))?;

        if snapshot.dimension != self.dimension || index.dimension() != self.dimension {
            return Err(StoreError::persistence(
                &paths.index,
                format!(
                    "snapshot dimension {} / index dimension {} do not match store dimension {}",
                    snapshot.dimension,
                    index.dimension(),
                    self.dimension
                ),
            ));
        }
        if index.metric() != self.config.metric {
            return Err(StoreError::persistence(
                &paths.index,
                format!(
                    "index ranks by {:?} but the store is configured for {:?}",
                    index.metric(),
                    self.config.metric
                ),
            ));
        }
        if index.len() != snapshot.entries.len() {
            return Err(StoreError::persistence(
                &paths.index,
                format!(
                    "index holds {} vectors for {} vocabulary entries",
                    index.len(),
                    snapshot.entries.len()
                ),
            ));
        }

        let mut seen = HashSet::with_capacity(snapshot.entries.len());
        let mut max_id = 0;
        for entry in &snapshot.entries {
            if !seen.insert(entry.id) || !index.contains(entry.id) {
                return Err(StoreError::persistence(
                    &paths.vocab,
                    format!("entry id {} is duplicated or missing from the index", entry.id),
                ));
            }
            let after = entry.id.checked_add(1).ok_or_else(|| {
                StoreError::persistence(&paths.vocab, format!("entry id {} is out of range", entry.id))
            })?;
            max_id = max_id.max(after);
        }

        if snapshot.model != self.provider.default_model() {
            warn!(
                "Snapshot was built with model {} but the provider uses {}",
                snapshot.model,
                self.provider.default_model()
            );
        }

        self.next_id = snapshot.next_id.max(max_id);
        self.positions = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, e)| (e.id, position))
            .collect();
        self.entries = snapshot.entries;
        self.index = index;

        info!(
            "Loaded {} entries from {}",
            self.entries.len(),
            paths.vocab.display()
        );
        Ok(())
    }

    /// Best-effort load: on failure the store keeps its state, a warning is
    /// logged and `false` is returned.
    pub async fn load(&mut self, target: Option<&Path>) -> bool {
        match self.try_load(target).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Keeping in-memory vocabulary, load failed: {e}");
                false
            }
        }
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(StoreError::EmptyStore);
        }
        Ok(())
    }

    fn position_for(&self, id: u64) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(StoreError::IndexDrift { id })
    }

    fn nearest(&self, query: &[f32]) -> Result<usize> {
        let neighbor = self
            .index
            .search(query, 1)?
            .into_iter()
            .next()
            .ok_or(StoreError::EmptyStore)?;
        self.position_for(neighbor.id)
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let response = self.provider.embed(EmbeddingRequest::new(text)).await?;
        self.check_dimension(&response.embedding)?;
        Ok(response.embedding)
    }

    async fn embed_all<'a>(&self, texts: impl Iterator<Item = &'a str>) -> Result<Vec<Embedding>> {
        let requests: Vec<EmbeddingRequest> = texts.map(EmbeddingRequest::new).collect();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let expected = requests.len();
        let responses = self.provider.embed_batch(requests).await?;
        if responses.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                responses.len()
            ))
            .into());
        }

        responses
            .into_iter()
            .map(|response| -> Result<Embedding> {
                self.check_dimension(&response.embedding)?;
                Ok(response.embedding)
            })
            .collect()
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use vdb_embeddings::{EmbeddingResponse, HashingProvider};

    /// Maps known words onto fixed axes; anything else fails to embed.
    struct AxisProvider;

    #[async_trait]
    impl EmbeddingProvider for AxisProvider {
        fn name(&self) -> &str {
            "axis"
        }

        fn default_model(&self) -> &str {
            "axis-v1"
        }

        fn default_dimension(&self) -> usize {
            3
        }

        async fn embed(&self, request: EmbeddingRequest) -> vdb_embeddings::Result<EmbeddingResponse> {
            let embedding = match request.text.as_str() {
                "hello" | "x" => vec![1.0, 0.0, 0.0],
                "y" => vec![0.0, 1.0, 0.0],
                "z" => vec![0.0, 0.0, 1.0],
                "xy" => vec![1.0, 1.0, 0.0],
                _ => return Err(EmbeddingError::ApiRequest(request.text.clone())),
            };
            Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model: "axis-v1".to_string(),
                tokens_used: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    async fn axis_store() -> VocabStore {
        VocabStore::new(StoreConfig::default(), Arc::new(AxisProvider))
            .await
            .unwrap()
    }

    fn assert_consistent(store: &VocabStore) {
        assert_eq!(store.index().len(), store.len());
        for (position, entry) in store.entries().iter().enumerate() {
            assert!(store.index().contains(entry.id));
            assert_eq!(store.positions.get(&entry.id), Some(&position));
        }
    }

    #[tokio::test]
    async fn test_dimension_comes_from_probe() {
        let store = axis_store().await;
        assert_eq!(store.dimension(), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_add_assigns_positions() {
        let mut store = axis_store().await;

        assert_eq!(store.add("x").await.unwrap(), 0);
        assert_eq!(store.add("y").await.unwrap(), 1);
        assert_eq!(store.fetch(1).unwrap(), "y");
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_failed_add_changes_nothing() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        let err = store.add("unknown").await.unwrap_err();
        assert!(matches!(err, StoreError::Embedding(_)));
        assert_eq!(store.texts().collect::<Vec<_>>(), vec!["x"]);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_failed_batch_changes_nothing() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        assert!(store.add_batch(["y", "unknown", "z"]).await.is_err());
        assert_eq!(store.len(), 1);
        assert_consistent(&store);

        assert_eq!(store.add_batch(["y", "z"]).await.unwrap(), 1..3);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_rollback_restores_state() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        let first_id = store.next_id;
        store.index.add(first_id, vec![0.0, 1.0, 0.0]).unwrap();
        store.next_id += 1;
        store.positions.insert(first_id, 1);
        store.entries.push(VocabularyEntry {
            id: first_id,
            text: "y".to_string(),
        });

        store.rollback(1, first_id);

        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id, first_id);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_exhausted_ids_reject_adds_until_reset() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();
        store.next_id = u64::MAX;

        assert!(matches!(store.add("y").await, Err(StoreError::IdsExhausted)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id, u64::MAX);

        store.next_id = u64::MAX - 1;
        assert!(matches!(
            store.add_batch(["y", "z"]).await,
            Err(StoreError::IdsExhausted)
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id, u64::MAX - 1);
        assert_consistent(&store);

        store.reset_index().await.unwrap();
        assert_eq!(store.add_batch(["y", "z"]).await.unwrap(), 1..3);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_remove_by_position_and_text() {
        let mut store = axis_store().await;
        store.add_batch(["x", "y", "z"]).await.unwrap();

        assert_eq!(store.remove(1_usize).unwrap(), "y");
        assert_eq!(store.texts().collect::<Vec<_>>(), vec!["x", "z"]);
        assert_eq!(store.fetch(1).unwrap(), "z");
        assert_consistent(&store);

        assert_eq!(store.remove("x").unwrap(), "x");
        assert_eq!(store.texts().collect::<Vec<_>>(), vec!["z"]);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_remove_errors() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        assert!(matches!(
            store.remove(5_usize),
            Err(StoreError::OutOfRange { position: 5, len: 1 })
        ));
        assert!(matches!(store.remove("y"), Err(StoreError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_duplicate_targets_exact_entry() {
        let mut store = axis_store().await;
        store.add_batch(["x", "y", "x"]).await.unwrap();
        let last_id = store.entries()[2].id;

        store.remove(0_usize).unwrap();

        // The surviving "x" keeps its own vector.
        assert!(store.index().contains(last_id));
        assert_eq!(store.similar("x").await.unwrap(), 1);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_remove_survives_index_drift() {
        let mut store = axis_store().await;
        store.add_batch(["x", "y"]).await.unwrap();
        let id = store.entries()[0].id;
        store.index.remove_ids(&[id]);

        assert_eq!(store.remove(0_usize).unwrap(), "x");
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_reset_index_renumbers() {
        let mut store = axis_store().await;
        store.add_batch(["x", "y", "z"]).await.unwrap();
        store.remove(0_usize).unwrap();

        store.reset_index().await.unwrap();

        let ids: Vec<u64> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(store.index().get(0), Some([0.0, 1.0, 0.0].as_slice()));
        assert_eq!(store.index().get(1), Some([0.0, 0.0, 1.0].as_slice()));
        assert_eq!(store.add("x").await.unwrap(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_reset_index_failure_keeps_old_index() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();
        // Bypass `add` so the vocabulary holds text the provider rejects.
        let id = store.next_id;
        store.index.add(id, vec![0.0, 1.0, 0.0]).unwrap();
        store.next_id += 1;
        store.positions.insert(id, 1);
        store.entries.push(VocabularyEntry {
            id,
            text: "unknown".to_string(),
        });

        assert!(store.reset_index().await.is_err());
        assert_eq!(store.index().len(), 2);
        assert_consistent(&store);
    }

    #[tokio::test]
    async fn test_similar_and_search() {
        let mut store = axis_store().await;
        store.add_batch(["x", "y", "z"]).await.unwrap();

        assert_eq!(store.similar("y").await.unwrap(), 1);
        assert_eq!(store.similar_text("z").await.unwrap(), "z");

        let hits = store.search("xy", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "x");
        assert_eq!(hits[1].text, "y");
        assert_eq!(hits[0].distance, hits[1].distance);
    }

    #[tokio::test]
    async fn test_queries_on_empty_store() {
        let store = axis_store().await;

        assert!(matches!(store.similar("x").await, Err(StoreError::EmptyStore)));
        assert!(matches!(
            store.confidence("x", true, 0.7).await,
            Err(StoreError::EmptyStore)
        ));
        assert!(matches!(
            store.fetch(0),
            Err(StoreError::OutOfRange { position: 0, len: 0 })
        ));
    }

    #[tokio::test]
    async fn test_confidence_modes() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        // cos(45°) between "xy" and "x".
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        let score = store.confidence("xy", true, 0.7).await.unwrap();
        assert!((score.score().unwrap() - expected).abs() < 1e-6);

        assert_eq!(
            store.confidence("xy", false, 0.5).await.unwrap(),
            Confidence::Present(true)
        );
        assert_eq!(
            store.confidence("xy", false, 0.8).await.unwrap(),
            Confidence::Present(false)
        );
        assert!(store.is_present("xy").await.unwrap());
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let mut store = axis_store().await;
        store.add("x").await.unwrap();

        let verdict = store.confidence("x", false, 1.0).await.unwrap();
        assert_eq!(verdict.present(), Some(false));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_from_provider() {
        let config = StoreConfig::default();
        let mut store = VocabStore::new(config, Arc::new(HashingProvider::new(8)))
            .await
            .unwrap();
        let wider: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(16));
        store.provider = wider;

        let err = store.add("hello").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Embedding(EmbeddingError::DimensionMismatch {
                expected: 8,
                actual: 16
            })
        ));
        assert!(store.is_empty());
    }
}
