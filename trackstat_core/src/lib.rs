//! TrackStat Core - parallel feature analysis for spot-tracking graphs
//!
//! This library computes derived numeric features over a tracking graph
//! (spots across time frames, linked into tracks). It is organized around:
//! 1. **Pluggable analyzers**: each declares an immutable feature schema
//!    and fills the shared store for a batch of edges or tracks.
//! 2. **Rank-ordered orchestration**: analyzers that read features written
//!    by other analyzers run strictly after their providers.
//! 3. **A reusable work dispatcher**: one pull-queue worker pool shared by
//!    every analyzer instead of per-analyzer thread plumbing.

pub mod analyzer;
pub mod analyzers;
pub mod dispatch;
pub mod error;
pub mod feature_store;
pub mod geometry;
pub mod graph;
pub mod orchestrator;

// Re-export key types for convenience
pub use analyzer::{Dimension, EdgeAnalyzer, FeatureAnalyzer, FeatureSchema, FeatureSpec, TrackAnalyzer, WorkerConfig};
pub use error::EngineError;
pub use feature_store::{FeatureKey, FeatureStore, StoreSnapshot};
pub use graph::{Edge, EdgeId, GraphBuilder, Spot, SpotId, Track, TrackId, TrackingGraph};
pub use orchestrator::FeatureEngine;
