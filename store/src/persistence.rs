//! On-disk layout of a store snapshot.
//!
//! A snapshot is a pair of artifacts: the ordered vocabulary (JSON) and the
//! index engine's opaque state. The vocabulary records a SHA-256 digest of
//! the index bytes it was saved with, so a vocabulary is never paired with
//! an index from another save.
//!
//! Both artifacts are staged in temp files before either is renamed into
//! place; the vocabulary is renamed last.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::store::VocabularyEntry;

/// Current vocabulary artifact format.
pub const FORMAT_VERSION: u32 = 1;

/// Locations of the two artifacts making up one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Ordered text list.
    pub vocab: PathBuf,

    /// Index engine state.
    pub index: PathBuf,
}

impl ArtifactPaths {
    /// Extension of the vocabulary artifact.
    pub const VOCAB_EXTENSION: &'static str = "mmp";

    /// Extension of the index artifact.
    pub const INDEX_EXTENSION: &'static str = "idm";

    /// Sibling artifacts derived from `base`; any extension on `base` is replaced.
    pub fn from_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            vocab: base.with_extension(Self::VOCAB_EXTENSION),
            index: base.with_extension(Self::INDEX_EXTENSION),
        }
    }

    /// The configured default artifacts.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            vocab: config.vocab_path.clone(),
            index: config.index_path.clone(),
        }
    }

    /// `target` when given, the configured defaults otherwise.
    pub fn resolve(target: Option<&Path>, config: &StoreConfig) -> Self {
        match target {
            Some(base) => Self::from_base(base),
            None => Self::from_config(config),
        }
    }
}

/// Contents of the vocabulary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    /// Artifact format version.
    pub format_version: u32,

    /// Model that produced the indexed vectors.
    pub model: String,

    /// Dimensionality of the indexed vectors.
    pub dimension: usize,

    /// Next stable id to hand out.
    pub next_id: u64,

    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,

    /// Hex SHA-256 of the index artifact saved alongside.
    pub index_digest: String,

    /// Entries in vocabulary order.
    pub entries: Vec<VocabularyEntry>,
}

impl VocabularySnapshot {
    pub(crate) fn decode(path: &Path, bytes: &[u8]) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_slice(bytes).map_err(|e| StoreError::persistence(path, e))?;

        if snapshot.format_version != FORMAT_VERSION {
            return Err(StoreError::persistence(
                path,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    snapshot.format_version
                ),
            ));
        }

        Ok(snapshot)
    }

    pub(crate) fn encode(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::persistence(path, e))
    }
}

/// Read a whole artifact.
pub(crate) async fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|e| StoreError::persistence(path, e))
}

/// Hex SHA-256 of an artifact's bytes.
pub(crate) fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write artifacts as one unit, creating parent directories as needed.
///
/// Every artifact is written to its temp file first; renames start only once
/// all writes succeeded, in the order given. On a failed write no artifact is
/// replaced and the temp files are removed.
pub(crate) async fn write_artifacts(artifacts: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(artifacts.len());
    for &(path, bytes) in artifacts {
        match stage(path, bytes).await {
            Ok(temp) => staged.push(temp),
            Err(e) => {
                discard(&staged).await;
                return Err(e);
            }
        }
    }

    for (&(path, bytes), temp) in artifacts.iter().zip(&staged) {
        fs::rename(temp, path)
            .await
            .map_err(|e| StoreError::persistence(path, e))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    }
    Ok(())
}

async fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::persistence(parent, e))?;
    }

    let temp = temp_path(path);
    fs::write(&temp, bytes)
        .await
        .map_err(|e| StoreError::persistence(&temp, e))?;
    Ok(temp)
}

async fn discard(staged: &[PathBuf]) {
    for temp in staged {
        if let Err(e) = fs::remove_file(temp).await {
            warn!("Could not remove {}: {e}", temp.display());
        }
    }
}
