//! The analysis orchestrator: analyzer registry, rank ordering, dependency
//! validation, and the feature query surface.
//!
//! Analyzers are registered with an explicit numeric rank; lower ranks run
//! first, and registration order breaks ties (analyzers sharing a rank must
//! not depend on one another). A run processes every edge analyzer over the
//! edge batch in rank order, then every track analyzer over the track
//! batch, and each `process` call fully joins its workers before the next
//! analyzer starts. That sequencing is the *only* mechanism by which a
//! dependent analyzer sees its dependencies complete; there are no
//! per-value runtime barriers.

use crate::analyzer::{EdgeAnalyzer, FeatureSpec, TrackAnalyzer};
use crate::error::EngineError;
use crate::feature_store::{FeatureKey, FeatureStore};
use crate::graph::{EdgeId, TrackId, TrackingGraph};
use std::collections::{HashMap, HashSet};
use tracing::debug;

struct Registered<A: ?Sized> {
    rank: i32,
    analyzer: Box<A>,
}

/// Owns the feature store and the rank-ordered analyzer lists.
pub struct FeatureEngine {
    edge_analyzers: Vec<Registered<dyn EdgeAnalyzer>>,
    track_analyzers: Vec<Registered<dyn TrackAnalyzer>>,
    edge_specs: HashMap<FeatureKey, FeatureSpec>,
    track_specs: HashMap<FeatureKey, FeatureSpec>,
    store: FeatureStore,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self {
            edge_analyzers: Vec::new(),
            track_analyzers: Vec::new(),
            edge_specs: HashMap::new(),
            track_specs: HashMap::new(),
            store: FeatureStore::new(),
        }
    }

    /// An engine with the built-in pipeline registered: directional edge
    /// statistics, then track duration and speed (rank 0), then the
    /// linear-motion analyzer that depends on them (rank 1).
    pub fn with_default_analyzers() -> Result<Self, EngineError> {
        use crate::analyzers::*;
        let mut engine = Self::new();
        engine.register_edge_analyzer(Box::new(DirectionalEdgeAnalyzer::new()), 0)?;
        engine.register_track_analyzer(Box::new(TrackDurationAnalyzer::new()), 0)?;
        engine.register_track_analyzer(Box::new(TrackSpeedAnalyzer::new()), 0)?;
        engine.register_track_analyzer(Box::new(LinearTrackAnalyzer::new()), 1)?;
        Ok(engine)
    }

    /// Registers an edge analyzer at the given rank. Fails on a feature-key
    /// collision with any analyzer already registered.
    pub fn register_edge_analyzer(
        &mut self,
        analyzer: Box<dyn EdgeAnalyzer>,
        rank: i32,
    ) -> Result<(), EngineError> {
        claim_keys(
            &mut self.edge_specs,
            &self.track_specs,
            analyzer.schema().analyzer_key,
            &analyzer.schema().features,
        )?;
        self.edge_analyzers.push(Registered { rank, analyzer });
        self.edge_analyzers.sort_by_key(|r| r.rank);
        Ok(())
    }

    /// Registers a track analyzer at the given rank.
    pub fn register_track_analyzer(
        &mut self,
        analyzer: Box<dyn TrackAnalyzer>,
        rank: i32,
    ) -> Result<(), EngineError> {
        claim_keys(
            &mut self.track_specs,
            &self.edge_specs,
            analyzer.schema().analyzer_key,
            &analyzer.schema().features,
        )?;
        self.track_analyzers.push(Registered { rank, analyzer });
        self.track_analyzers.sort_by_key(|r| r.rank);
        Ok(())
    }

    /// Overrides the worker count of every registered analyzer.
    pub fn set_num_threads(&mut self, n: usize) -> Result<(), EngineError> {
        for reg in &mut self.edge_analyzers {
            reg.analyzer.set_num_threads(n)?;
        }
        for reg in &mut self.track_analyzers {
            reg.analyzer.set_num_threads(n)?;
        }
        Ok(())
    }

    /// Runs every registered analyzer over the full graph.
    pub fn analyze_all(&mut self, graph: &TrackingGraph) -> Result<(), EngineError> {
        let edges = graph.edge_ids();
        let tracks = graph.track_ids();
        self.analyze_incremental(graph, &edges, &tracks)
    }

    /// Runs every registered analyzer over the affected elements only,
    /// honoring rank order. Halts at the first failing analyzer: later
    /// analyzers would read incomplete dependencies.
    pub fn analyze_incremental(
        &mut self,
        graph: &TrackingGraph,
        changed_edges: &[EdgeId],
        changed_tracks: &[TrackId],
    ) -> Result<(), EngineError> {
        self.validate_dependencies()?;

        for reg in &mut self.edge_analyzers {
            reg.analyzer.process(changed_edges, graph, &self.store)?;
            debug!(
                analyzer = reg.analyzer.key(),
                rank = reg.rank,
                batch = changed_edges.len(),
                threads = reg.analyzer.num_threads(),
                elapsed_ms = reg.analyzer.processing_time().as_millis() as u64,
                "edge analyzer batch complete"
            );
        }
        for reg in &mut self.track_analyzers {
            reg.analyzer.process(changed_tracks, graph, &self.store)?;
            debug!(
                analyzer = reg.analyzer.key(),
                rank = reg.rank,
                batch = changed_tracks.len(),
                threads = reg.analyzer.num_threads(),
                elapsed_ms = reg.analyzer.processing_time().as_millis() as u64,
                "track analyzer batch complete"
            );
        }
        Ok(())
    }

    /// Checks that every declared dependency is produced by an analyzer of
    /// strictly lower rank (same-rank analyzers carry no ordering
    /// guarantee). Track analyzers may additionally depend on any edge
    /// feature, since all edge analyzers complete first.
    fn validate_dependencies(&self) -> Result<(), EngineError> {
        let mut produced: HashSet<FeatureKey> = HashSet::new();
        validate_ranked(&self.edge_analyzers, &produced, |reg| {
            (reg.rank, reg.analyzer.schema())
        })?;

        produced.extend(self.edge_specs.keys().copied());
        validate_ranked(&self.track_analyzers, &produced, |reg| {
            (reg.rank, reg.analyzer.schema())
        })?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Query surface
    // ---------------------------------------------------------------------

    /// The value of an edge feature. `Ok(None)` means declared but never
    /// computed; an unknown key is a configuration error.
    pub fn edge_feature(&self, edge: EdgeId, key: &str) -> Result<Option<f64>, EngineError> {
        let spec = self
            .edge_specs
            .get(key)
            .ok_or_else(|| EngineError::unknown_feature(key))?;
        Ok(self.store.edge_feature(edge, spec.key))
    }

    /// The value of a track feature.
    pub fn track_feature(&self, track: TrackId, key: &str) -> Result<Option<f64>, EngineError> {
        let spec = self
            .track_specs
            .get(key)
            .ok_or_else(|| EngineError::unknown_feature(key))?;
        Ok(self.store.track_feature(track, spec.key))
    }

    /// Display metadata of a feature key.
    pub fn schema_of(&self, key: &str) -> Result<&FeatureSpec, EngineError> {
        self.edge_specs
            .get(key)
            .or_else(|| self.track_specs.get(key))
            .ok_or_else(|| EngineError::unknown_feature(key))
    }

    /// Direct read access to the store, for export collaborators.
    pub fn store(&self) -> &FeatureStore {
        &self.store
    }
}

/// Inserts an analyzer's feature keys into its namespace map, rejecting
/// collisions with either namespace.
fn claim_keys(
    own: &mut HashMap<FeatureKey, FeatureSpec>,
    other: &HashMap<FeatureKey, FeatureSpec>,
    analyzer_key: &'static str,
    features: &[FeatureSpec],
) -> Result<(), EngineError> {
    for spec in features {
        if own.contains_key(spec.key) || other.contains_key(spec.key) {
            return Err(EngineError::DuplicateFeature {
                key: spec.key.to_string(),
                analyzer: analyzer_key.to_string(),
            });
        }
    }
    for spec in features {
        own.insert(spec.key, spec.clone());
    }
    Ok(())
}

/// Walks a rank-sorted analyzer list, checking each analyzer's declared
/// dependencies against the keys produced at strictly lower ranks plus the
/// caller-supplied baseline.
fn validate_ranked<R>(
    registered: &[R],
    baseline: &HashSet<FeatureKey>,
    schema_of: impl Fn(&R) -> (i32, &crate::analyzer::FeatureSchema),
) -> Result<(), EngineError> {
    let mut lower_ranks: HashSet<FeatureKey> = baseline.clone();
    let mut current_rank_keys: Vec<FeatureKey> = Vec::new();
    let mut current_rank: Option<i32> = None;

    for reg in registered {
        let (rank, schema) = schema_of(reg);
        if current_rank != Some(rank) {
            lower_ranks.extend(current_rank_keys.drain(..));
            current_rank = Some(rank);
        }
        for dep in &schema.dependencies {
            if !lower_ranks.contains(dep) {
                return Err(EngineError::UnsatisfiedDependency {
                    analyzer: schema.analyzer_key.to_string(),
                    feature: dep.to_string(),
                });
            }
        }
        current_rank_keys.extend(schema.feature_keys());
    }
    Ok(())
}
