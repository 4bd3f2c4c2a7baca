//! Embedding cache.
//!
//! The vocabulary store re-embeds stored text for confidence scoring and
//! index rebuilds, so wrapping a remote provider in a [`CachedProvider`]
//! turns most of those calls into lookups.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    model: String,
    text: String,
    dimensions: Option<usize>,
}

impl CacheKey {
    fn new(text: &str, model: &str, dimensions: Option<usize>) -> Self {
        Self {
            model: model.to_string(),
            text: text.to_string(),
            dimensions,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    embedding: Embedding,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Bounded in-memory cache; the least recently used entry is evicted first.
pub struct EmbeddingCache {
    state: Mutex<CacheState>,
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries,
        }
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        self.lookup(CacheKey::new(text, model, None)).await
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        self.insert(CacheKey::new(text, model, None), embedding).await;
    }

    async fn lookup(&self, key: CacheKey) -> Option<Embedding> {
        let mut state = self.state.lock().await;
        let now = state.tick();

        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_used = now;
                let embedding = entry.embedding.clone();
                state.hits += 1;
                Some(embedding)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    async fn insert(&self, key: CacheKey, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let mut state = self.state.lock().await;
        let now = state.tick();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        debug!("Cached embedding for text (model: {})", key.model);
        state.entries.insert(
            key,
            CacheEntry {
                embedding,
                last_used: now,
            },
        );
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str) -> bool {
        let key = CacheKey::new(text, model, None);
        self.state.lock().await.entries.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.state.lock().await.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that fell through to the provider.
    pub misses: u64,
}

/// A provider that answers repeated requests from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());

        let key = CacheKey::new(&request.text, &model, request.dimensions);

        if let Some(embedding) = self.cache.lookup(key.clone()).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model,
                tokens_used: None,
            });
        }

        let response = self.provider.embed(request).await?;
        self.cache.insert(key, response.embedding.clone()).await;

        Ok(response)
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
