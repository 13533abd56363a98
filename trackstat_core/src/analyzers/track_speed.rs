//! Per-track speed statistics over the instantaneous (per-edge) speeds.
//! Dependency provider for the linear-motion analyzer.

use crate::analyzer::{
    Dimension, FeatureAnalyzer, FeatureSchema, FeatureSpec, TrackAnalyzer, WorkerConfig,
};
use crate::dispatch;
use crate::error::EngineError;
use crate::feature_store::FeatureStore;
use crate::graph::{TrackId, TrackingGraph};
use std::time::Duration;

pub const KEY: &str = "Track speed statistics";

pub const TRACK_MEAN_SPEED: &str = "TRACK_MEAN_SPEED";
pub const TRACK_MAX_SPEED: &str = "TRACK_MAX_SPEED";

/// Track analyzer for mean and max instantaneous speed.
pub struct TrackSpeedAnalyzer {
    schema: FeatureSchema,
    config: WorkerConfig,
}

impl Default for TrackSpeedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSpeedAnalyzer {
    pub fn new() -> Self {
        let schema = FeatureSchema {
            analyzer_key: KEY,
            analyzer_name: "Track speed statistics",
            features: vec![
                FeatureSpec {
                    key: TRACK_MEAN_SPEED,
                    name: "Mean speed",
                    short_name: "Mean v.",
                    dimension: Dimension::Velocity,
                    is_int: false,
                },
                FeatureSpec {
                    key: TRACK_MAX_SPEED,
                    name: "Max speed",
                    short_name: "Max v.",
                    dimension: Dimension::Velocity,
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

impl FeatureAnalyzer for TrackSpeedAnalyzer {
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

impl TrackAnalyzer for TrackSpeedAnalyzer {
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
            let track = graph
                .track(track_id)
                .ok_or_else(|| EngineError::missing_element(track_id))?;

            let mut sum = 0.0;
            let mut max = f64::NEG_INFINITY;
            let mut n = 0usize;
            for &edge_id in &track.edges {
                let (source, target) = graph
                    .normalized_endpoints(edge_id)
                    .ok_or_else(|| EngineError::missing_element(edge_id))?;
                // dt of zero propagates to an infinite speed, unguarded.
                let speed = (target.position - source.position).norm() / (target.t - source.t);
                sum += speed;
                if speed > max {
                    max = speed;
                }
                n += 1;
            }

            store.put_track_feature(track_id, TRACK_MEAN_SPEED, sum / n as f64);
            store.put_track_feature(track_id, TRACK_MAX_SPEED, max);
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
    fn test_mean_and_max_speed() {
        let mut b = GraphBuilder::new();
        let s0 = b.add_spot(Vector3::new(0.0, 0.0, 0.0), 0, 0.0, 1.0, 1.0);
        let s1 = b.add_spot(Vector3::new(1.0, 0.0, 0.0), 1, 1.0, 1.0, 1.0);
        let s2 = b.add_spot(Vector3::new(4.0, 0.0, 0.0), 2, 2.0, 1.0, 1.0);
        b.add_edge(s0, s1);
        b.add_edge(s1, s2);
        let graph = b.build();

        let store = FeatureStore::new();
        let mut analyzer = TrackSpeedAnalyzer::new();
        analyzer
            .process(&graph.track_ids(), &graph, &store)
            .unwrap();

        let t = graph.track_ids()[0];
        assert_relative_eq!(
            store.track_feature(t, TRACK_MEAN_SPEED).unwrap(),
            2.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            store.track_feature(t, TRACK_MAX_SPEED).unwrap(),
            3.0,
            epsilon = 1e-9
        );
    }
}
