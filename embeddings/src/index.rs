//! Nearest-neighbor engines addressed by integer ids.
//!
//! The vocabulary store only talks to engines through [`VectorIndex`], so
//! alternative strategies (trees, quantized scans) can be dropped in without
//! touching the store.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{cosine_similarity, squared_l2};

/// Distance used by an engine to rank stored vectors. Lower is nearer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared euclidean distance.
    #[default]
    L2,
    /// `1 - cosine_similarity`.
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors under this metric.
    pub fn distance(self, a: &[f32], b: &[f32]) -> Result<f32> {
        match self {
            DistanceMetric::L2 => squared_l2(a, b),
            DistanceMetric::Cosine => cosine_similarity(a, b).map(|sim| 1.0 - sim),
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Id the vector was stored under.
    pub id: u64,

    /// Distance to the query under the engine's metric.
    pub distance: f32,
}

/// Contract every nearest-neighbor engine fulfils.
pub trait VectorIndex: Send + Sync {
    /// Create an empty engine for vectors of `dimension` components.
    fn empty(dimension: usize, metric: DistanceMetric) -> Self
    where
        Self: Sized;

    /// Rebuild an engine from bytes produced by [`VectorIndex::snapshot`].
    fn restore(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    /// Fixed dimensionality of stored vectors.
    fn dimension(&self) -> usize;

    /// Metric used for ranking.
    fn metric(&self) -> DistanceMetric;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Whether the engine holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a vector is stored under `id`.
    fn contains(&self, id: u64) -> bool;

    /// The vector stored under `id`.
    fn get(&self, id: u64) -> Option<&[f32]>;

    /// Store `vector` under `id`.
    fn add(&mut self, id: u64, vector: Embedding) -> Result<()>;

    /// The `k` nearest stored vectors, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Drop the vectors stored under `ids`, returning how many were present.
    fn remove_ids(&mut self, ids: &[u64]) -> usize;

    /// Remove every vector, keeping dimension and metric.
    fn reset(&mut self);

    /// Opaque serialized state.
    fn snapshot(&self) -> Result<Vec<u8>>;
}

/// A stored vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: u64,
    vector: Embedding,
}

#[derive(Serialize, Deserialize)]
struct FlatSnapshot {
    dimension: usize,
    metric: DistanceMetric,
    entries: Vec<StoredVector>,
}

/// Brute-force engine that scans every stored vector on search.
///
/// Vectors are kept in insertion order; equal distances rank the earlier
/// insertion first.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    /// Stored vectors in insertion order.
    entries: Vec<StoredVector>,

    /// id -> slot in `entries`.
    slots: HashMap<u64, usize>,

    /// Expected dimension of vectors.
    dimension: usize,

    metric: DistanceMetric,
}

impl FlatIndex {
    /// Create a new flat L2 index.
    pub fn new(dimension: usize) -> Self {
        Self::empty(dimension, DistanceMetric::L2)
    }

    /// Switch the ranking metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn rebuild_slots(&mut self) {
        self.slots = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (e.id, slot))
            .collect();
    }
}

impl VectorIndex for FlatIndex {
    fn empty(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
            dimension,
            metric,
        }
    }

    fn restore(bytes: &[u8]) -> Result<Self> {
        let snapshot: FlatSnapshot = serde_json::from_slice(bytes)?;

        let mut index = Self::empty(snapshot.dimension, snapshot.metric);
        for entry in snapshot.entries {
            index.add(entry.id, entry.vector)?;
        }

        info!("Restored {} vectors into flat index", index.len());
        Ok(index)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    fn get(&self, id: u64) -> Option<&[f32]> {
        self.slots
            .get(&id)
            .map(|&slot| self.entries[slot].vector.as_slice())
    }

    fn add(&mut self, id: u64, vector: Embedding) -> Result<()> {
        self.check_dimension(vector.len())?;
        if self.slots.contains_key(&id) {
            return Err(EmbeddingError::DuplicateId(id));
        }

        self.slots.insert(id, self.entries.len());
        self.entries.push(StoredVector { id, vector });
        debug!("Added vector {id} to flat index");

        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query.len())?;

        let mut scored: Vec<(OrderedFloat<f32>, u64)> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let distance = self.metric.distance(query, &entry.vector)?;
            scored.push((OrderedFloat(distance), entry.id));
        }

        // Stable sort keeps insertion order among ties.
        scored.sort_by_key(|(distance, _)| *distance);

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, id)| Neighbor {
                id,
                distance: distance.0,
            })
            .collect())
    }

    fn remove_ids(&mut self, ids: &[u64]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(&e.id));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.rebuild_slots();
        }
        debug!("Removed {removed} vectors from flat index");
        removed
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.slots.clear();
        info!("Cleared flat index");
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = FlatSnapshot {
            dimension: self.dimension,
            metric: self.metric,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }
}
