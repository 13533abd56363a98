//! The analyzer contract: schema metadata and the `process` entry points.
//!
//! An analyzer declares, once, an immutable [`FeatureSchema`] (which
//! features it writes, which features of *other* analyzers it reads) and
//! fills the feature store for a batch of elements when asked. The only
//! mutable state an analyzer carries is its worker configuration and the
//! last measured processing time, bundled in [`WorkerConfig`].

use crate::error::EngineError;
use crate::feature_store::{FeatureKey, FeatureStore};
use crate::graph::{EdgeId, TrackId, TrackingGraph};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Physical dimension tag of a feature, used by display/export collaborators
/// to attach units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Length,
    Velocity,
    Time,
    Angle,
    /// Angular change per unit time
    Rate,
    Quality,
    Dimensionless,
}

/// Static description of one feature.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSpec {
    pub key: FeatureKey,
    /// Human-readable name
    pub name: &'static str,
    /// Short name for table headers
    pub short_name: &'static str,
    pub dimension: Dimension,
    /// Whether values are integer-valued (stored as f64 regardless)
    pub is_int: bool,
}

/// Immutable schema of one analyzer: identity, declared features, and the
/// feature keys it reads from earlier analyzers.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSchema {
    /// Stable identity of the analyzer
    pub analyzer_key: &'static str,
    /// Human-readable name
    pub analyzer_name: &'static str,
    /// Features this analyzer writes
    pub features: Vec<FeatureSpec>,
    /// Features this analyzer reads but does not write. The orchestrator
    /// verifies, before any batch runs, that each one is produced by an
    /// analyzer earlier in rank order.
    pub dependencies: Vec<FeatureKey>,
}

impl FeatureSchema {
    /// Keys of the features this analyzer writes.
    pub fn feature_keys(&self) -> impl Iterator<Item = FeatureKey> + '_ {
        self.features.iter().map(|f| f.key)
    }
}

/// Behavior common to edge and track analyzers.
pub trait FeatureAnalyzer: Send {
    fn schema(&self) -> &FeatureSchema;

    /// Worker threads used by `process`.
    fn num_threads(&self) -> usize;

    /// Overrides the worker count. Zero is a configuration error.
    fn set_num_threads(&mut self, n: usize) -> Result<(), EngineError>;

    /// Wall time of the last non-empty `process` call.
    fn processing_time(&self) -> Duration;

    fn key(&self) -> &'static str {
        self.schema().analyzer_key
    }
}

/// An analyzer operating on edges.
///
/// `process` must write features for exactly the supplied edges, be a
/// no-op on an empty batch, and stay independent across elements (any
/// cross-element information flows through features committed by earlier
/// analyzers).
pub trait EdgeAnalyzer: FeatureAnalyzer {
    fn process(
        &mut self,
        edges: &[EdgeId],
        graph: &TrackingGraph,
        store: &FeatureStore,
    ) -> Result<(), EngineError>;
}

/// An analyzer operating on whole tracks, identified by track id.
pub trait TrackAnalyzer: FeatureAnalyzer {
    fn process(
        &mut self,
        tracks: &[TrackId],
        graph: &TrackingGraph,
        store: &FeatureStore,
    ) -> Result<(), EngineError>;
}

// =============================================================================
// WORKER CONFIG
// =============================================================================

/// Worker-count setting plus last-run telemetry, embedded by every
/// built-in analyzer.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    num_threads: usize,
    last_processing_time: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerConfig {
    /// Defaults the worker count to the available hardware parallelism.
    pub fn new() -> Self {
        Self {
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            last_processing_time: Duration::ZERO,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn set_num_threads(&mut self, n: usize) -> Result<(), EngineError> {
        if n == 0 {
            return Err(EngineError::InvalidWorkerCount(n));
        }
        self.num_threads = n;
        Ok(())
    }

    pub fn processing_time(&self) -> Duration {
        self.last_processing_time
    }

    /// Records the wall time of a completed run.
    pub fn record(&mut self, elapsed: Duration) {
        self.last_processing_time = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_defaults_to_at_least_one() {
        let cfg = WorkerConfig::new();
        assert!(cfg.num_threads() >= 1);
        assert_eq!(cfg.processing_time(), Duration::ZERO);
    }

    #[test]
    fn test_zero_worker_count_rejected() {
        let mut cfg = WorkerConfig::new();
        assert!(matches!(
            cfg.set_num_threads(0),
            Err(EngineError::InvalidWorkerCount(0))
        ));
        assert!(cfg.num_threads() >= 1);
        cfg.set_num_threads(3).unwrap();
        assert_eq!(cfg.num_threads(), 3);
    }
}
