//! Per-track timing and net displacement. These are the dependency
//! features the linear-motion analyzer reads, so this analyzer must be
//! registered at a lower rank.

use crate::analyzer::{
    Dimension, FeatureAnalyzer, FeatureSchema, FeatureSpec, TrackAnalyzer, WorkerConfig,
};
use crate::dispatch;
use crate::error::EngineError;
use crate::feature_store::FeatureStore;
use crate::graph::{TrackId, TrackingGraph};
use std::time::Duration;

pub const KEY: &str = "Track duration";

pub const TRACK_START: &str = "TRACK_START";
pub const TRACK_STOP: &str = "TRACK_STOP";
pub const TRACK_DURATION: &str = "TRACK_DURATION";
pub const TRACK_DISPLACEMENT: &str = "TRACK_DISPLACEMENT";

/// Track analyzer for start/stop times, duration and net displacement.
pub struct TrackDurationAnalyzer {
    schema: FeatureSchema,
    config: WorkerConfig,
}

impl Default for TrackDurationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackDurationAnalyzer {
    pub fn new() -> Self {
        let schema = FeatureSchema {
            analyzer_key: KEY,
            analyzer_name: "Track duration",
            features: vec![
                FeatureSpec {
                    key: TRACK_START,
                    name: "Track start",
                    short_name: "T start",
                    dimension: Dimension::Time,
                    is_int: false,
                },
                FeatureSpec {
                    key: TRACK_STOP,
                    name: "Track stop",
                    short_name: "T stop",
                    dimension: Dimension::Time,
                    is_int: false,
                },
                FeatureSpec {
                    key: TRACK_DURATION,
                    name: "Track duration",
                    short_name: "Duration",
                    dimension: Dimension::Time,
                    is_int: false,
                },
                FeatureSpec {
                    key: TRACK_DISPLACEMENT,
                    name: "Track displacement",
                    short_name: "Displacement",
                    dimension: Dimension::Length,
                    is_int: false,
                },
            ],
            dependencies: Vec::new(),
        };
        Self {
            schema,
            config: WorkerConfig::new(),
        }
    }
}

impl FeatureAnalyzer for TrackDurationAnalyzer {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn num_threads(&self) -> usize {
        self.config.num_threads()
    }

    fn set_num_threads(&mut self, n: usize) -> Result<(), EngineError> {
        self.config.set_num_threads(n)
    }

    fn processing_time(&self) -> Duration {
        self.config.processing_time()
    }
}

impl TrackAnalyzer for TrackDurationAnalyzer {
    fn process(
        &mut self,
        tracks: &[TrackId],
        graph: &TrackingGraph,
        store: &FeatureStore,
    ) -> Result<(), EngineError> {
        if tracks.is_empty() {
            return Ok(());
        }

        let elapsed = dispatch::run_batch(tracks, self.config.num_threads(), KEY, |&track_id| {
            let first = graph
                .first_spot_of(track_id)
                .ok_or_else(|| EngineError::missing_element(track_id))?;
            let last = graph
                .last_spot_of(track_id)
                .ok_or_else(|| EngineError::missing_element(track_id))?;

            store.put_track_feature(track_id, TRACK_START, first.t);
            store.put_track_feature(track_id, TRACK_STOP, last.t);
            store.put_track_feature(track_id, TRACK_DURATION, last.t - first.t);
            store.put_track_feature(
                track_id,
                TRACK_DISPLACEMENT,
                (last.position - first.position).norm(),
            );
            Ok(())
        })?;

        self.config.record(elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_duration_and_displacement() {
        let mut b = GraphBuilder::new();
        let s0 = b.add_spot(Vector3::new(0.0, 0.0, 0.0), 0, 0.0, 1.0, 1.0);
        let s1 = b.add_spot(Vector3::new(3.0, 0.0, 0.0), 1, 1.0, 1.0, 1.0);
        let s2 = b.add_spot(Vector3::new(3.0, 4.0, 0.0), 2, 2.0, 1.0, 1.0);
        b.add_edge(s0, s1);
        b.add_edge(s1, s2);
        let graph = b.build();

        let store = FeatureStore::new();
        let mut analyzer = TrackDurationAnalyzer::new();
        analyzer
            .process(&graph.track_ids(), &graph, &store)
            .unwrap();

        let t = graph.track_ids()[0];
        assert_relative_eq!(store.track_feature(t, TRACK_START).unwrap(), 0.0);
        assert_relative_eq!(store.track_feature(t, TRACK_STOP).unwrap(), 2.0);
        assert_relative_eq!(store.track_feature(t, TRACK_DURATION).unwrap(), 2.0);
        // 3-4-5 triangle.
        assert_relative_eq!(
            store.track_feature(t, TRACK_DISPLACEMENT).unwrap(),
            5.0,
            epsilon = 1e-9
        );
    }
}
