//! The shared feature store: `(element, feature key) -> f64`.
//!
//! Within one analyzer run, concurrent workers write *disjoint* keys (the
//! dispatcher hands each element to exactly one worker), and reads only
//! target features committed by analyzers that have already fully joined.
//! The sharded locks below are therefore never contended for correctness,
//! only to satisfy the memory model; a write takes a shard lock for the
//! duration of one `HashMap` insert.
//!
//! `NaN` is a legitimate stored value ("defined but numerically
//! undefined", e.g. a directional change at a branch point). An *absent*
//! entry means the feature was never computed; the two states are distinct.

use crate::graph::{EdgeId, TrackId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Feature keys are static strings declared by analyzer schemas.
pub type FeatureKey = &'static str;

const N_SHARDS: usize = 16;

/// Concurrent store for edge and track feature values.
#[derive(Debug)]
pub struct FeatureStore {
    edge_shards: Vec<RwLock<HashMap<(EdgeId, FeatureKey), f64>>>,
    track_shards: Vec<RwLock<HashMap<(TrackId, FeatureKey), f64>>>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore {
    pub fn new() -> Self {
        Self {
            edge_shards: (0..N_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            track_shards: (0..N_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(id: u32) -> usize {
        id as usize % N_SHARDS
    }

    /// Writes an edge feature value, replacing any previous value.
    pub fn put_edge_feature(&self, edge: EdgeId, key: FeatureKey, value: f64) {
        let mut shard = self.edge_shards[Self::shard(edge.0)]
            .write()
            .unwrap_or_else(|e| e.into_inner());
        shard.insert((edge, key), value);
    }

    /// Reads an edge feature value. `None` means never computed.
    pub fn edge_feature(&self, edge: EdgeId, key: FeatureKey) -> Option<f64> {
        let shard = self.edge_shards[Self::shard(edge.0)]
            .read()
            .unwrap_or_else(|e| e.into_inner());
        shard.get(&(edge, key)).copied()
    }

    /// Writes a track feature value, replacing any previous value.
    pub fn put_track_feature(&self, track: TrackId, key: FeatureKey, value: f64) {
        let mut shard = self.track_shards[Self::shard(track.0)]
            .write()
            .unwrap_or_else(|e| e.into_inner());
        shard.insert((track, key), value);
    }

    /// Reads a track feature value. `None` means never computed.
    pub fn track_feature(&self, track: TrackId, key: FeatureKey) -> Option<f64> {
        let shard = self.track_shards[Self::shard(track.0)]
            .read()
            .unwrap_or_else(|e| e.into_inner());
        shard.get(&(track, key)).copied()
    }

    /// Drops every stored value.
    pub fn clear(&self) {
        for shard in &self.edge_shards {
            shard.write().unwrap_or_else(|e| e.into_inner()).clear();
        }
        for shard in &self.track_shards {
            shard.write().unwrap_or_else(|e| e.into_inner()).clear();
        }
    }

    /// Total number of stored values (edges + tracks).
    pub fn len(&self) -> usize {
        let edges: usize = self
            .edge_shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum();
        let tracks: usize = self
            .track_shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum();
        edges + tracks
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic, serializable copy of the store contents, for the
    /// host's persistence/export layer. Entries are sorted by (id, key).
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut edge_features: Vec<(EdgeId, String, f64)> = self
            .edge_shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .map(|((id, key), v)| (*id, key.to_string(), *v))
                    .collect::<Vec<_>>()
            })
            .collect();
        let mut track_features: Vec<(TrackId, String, f64)> = self
            .track_shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .map(|((id, key), v)| (*id, key.to_string(), *v))
                    .collect::<Vec<_>>()
            })
            .collect();
        edge_features.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        track_features.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        StoreSnapshot {
            edge_features,
            track_features,
        }
    }
}

/// Sorted, serializable view of the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub edge_features: Vec<(EdgeId, String, f64)>,
    pub track_features: Vec<(TrackId, String, f64)>,
}
