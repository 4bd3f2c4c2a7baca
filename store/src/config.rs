//! Configuration for the vocabulary store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vdb_embeddings::{
    CachedProvider, DistanceMetric, EmbeddingCache, EmbeddingError, EmbeddingProvider,
    HashingProvider, OpenAIProvider,
};

use crate::error::{Result, StoreError};

/// Configuration for a [`crate::VocabStore`]. Fixed once the store is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Default location of the vocabulary artifact.
    pub vocab_path: PathBuf,

    /// Default location of the index artifact.
    pub index_path: PathBuf,

    /// Threshold used by [`crate::VocabStore::is_present`].
    pub confidence_threshold: f32,

    /// Text embedded once at construction to learn the dimensionality.
    pub probe_text: String,

    /// Metric the index engine ranks by.
    pub metric: DistanceMetric,
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            vocab_path: PathBuf::from("./storage/vocab.mmp"),
            index_path: PathBuf::from("./storage/vocab.idm"),
            confidence_threshold: 0.7,
            probe_text: "hello".to_string(),
            metric: DistanceMetric::L2,
        }
    }

    /// Set both default artifact paths.
    pub fn with_paths(mut self, vocab: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        self.vocab_path = vocab.into();
        self.index_path = index.into();
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the default confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the index metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(StoreError::Config(
                "confidence_threshold must be a finite number".to_string(),
            ));
        }
        if self.probe_text.trim().is_empty() {
            return Err(StoreError::Config("probe_text must not be blank".to_string()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model identifier; `None` keeps the provider's default.
    pub model: Option<String>,

    /// Output size of the hashing provider.
    pub hashing_dimension: usize,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            model: None,
            hashing_dimension: 512,
            cache_enabled: true,
            cache_max_entries: 10000,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured provider, wrapped in a cache when enabled.
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.provider {
            EmbeddingProviderType::OpenAI => {
                let mut provider = OpenAIProvider::new();
                if let Some(model) = &self.model {
                    provider = provider.with_model(model);
                }
                if !provider.is_available() {
                    return Err(EmbeddingError::ProviderNotConfigured.into());
                }
                Ok(self.wrap(provider))
            }
            EmbeddingProviderType::Hashing => {
                let mut provider = HashingProvider::new(self.hashing_dimension);
                if let Some(model) = &self.model {
                    provider = provider.with_model(model);
                }
                Ok(self.wrap(provider))
            }
        }
    }

    fn wrap<P>(&self, provider: P) -> Arc<dyn EmbeddingProvider>
    where
        P: EmbeddingProvider + 'static,
    {
        if self.cache_enabled {
            Arc::new(CachedProvider::new(
                provider,
                EmbeddingCache::new(self.cache_max_entries),
            ))
        } else {
            Arc::new(provider)
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Offline feature-hashing embeddings.
    Hashing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.vocab_path, PathBuf::from("./storage/vocab.mmp"));
        assert_eq!(config.index_path, PathBuf::from("./storage/vocab.idm"));
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.metric, DistanceMetric::L2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            vocab_path = "data/words.mmp"
            confidence_threshold = 0.5
            metric = "cosine"

            [embedding]
            provider = "hashing"
            hashing_dimension = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.vocab_path, PathBuf::from("data/words.mmp"));
        assert_eq!(config.index_path, PathBuf::from("./storage/vocab.idm"));
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.embedding.hashing_dimension, 64);
        assert!(config.embedding.cache_enabled);
    }

    #[test]
    fn test_openai_provider_name() {
        let config = StoreConfig::from_toml_str(
            r#"
            [embedding]
            provider = "openai"
            model = "text-embedding-3-large"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAI);
    }

    #[test]
    fn test_invalid_toml() {
        let err = StoreConfig::from_toml_str("confidence_threshold = \"high\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let err = StoreConfig::from_toml_str("probe_text = \"  \"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vdb.toml");
        std::fs::write(
            &path,
            r#"
            index_path = "data/words.idm"
            probe_text = "ping"

            [embedding]
            hashing_dimension = 96
            cache_enabled = false
            "#,
        )
        .unwrap();

        let config = StoreConfig::from_file(&path).await.unwrap();
        assert_eq!(config.index_path, PathBuf::from("data/words.idm"));
        assert_eq!(config.vocab_path, PathBuf::from("./storage/vocab.mmp"));
        assert_eq!(config.probe_text, "ping");
        assert_eq!(config.embedding.hashing_dimension, 96);
        assert!(!config.embedding.cache_enabled);

        let err = StoreConfig::from_file(dir.path().join("missing.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        std::fs::write(&path, "confidence_threshold = [").unwrap();
        let err = StoreConfig::from_file(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_build_hashing_provider() {
        let embedding = EmbeddingConfig {
            hashing_dimension: 32,
            cache_enabled: false,
            ..EmbeddingConfig::default()
        };
        let provider = embedding.build_provider().unwrap();
        assert_eq!(provider.name(), "hashing");
        assert_eq!(provider.default_dimension(), 32);
    }
}
