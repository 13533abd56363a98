//! Directional statistics per edge: absolute displacement angles in the
//! three coordinate planes, and the rate of directional change relative to
//! the unique predecessor edge.
//!
//! Directional change is undefined at a track root (no predecessor) and at
//! a branch point (several predecessors); both store `NaN`. This is the
//! policy the whole engine follows for predecessor ambiguity.

use crate::analyzer::{
    Dimension, EdgeAnalyzer, FeatureAnalyzer, FeatureSchema, FeatureSpec, WorkerConfig,
};
use crate::dispatch;
use crate::error::EngineError;
use crate::feature_store::FeatureStore;
use crate::geometry;
use crate::graph::{EdgeId, TrackingGraph};
use std::time::Duration;

pub const KEY: &str = "Directional edge statistics";

pub const ABSOLUTE_ANGLE_XY: &str = "ABSOLUTE_ANGLE_XY";
pub const ABSOLUTE_ANGLE_YZ: &str = "ABSOLUTE_ANGLE_YZ";
pub const ABSOLUTE_ANGLE_ZX: &str = "ABSOLUTE_ANGLE_ZX";
pub const DIRECTIONAL_CHANGE_RATE: &str = "DIRECTIONAL_CHANGE_RATE";

/// Edge analyzer for displacement angles and directional-change rate.
pub struct DirectionalEdgeAnalyzer {
    schema: FeatureSchema,
    config: WorkerConfig,
}

impl Default for DirectionalEdgeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectionalEdgeAnalyzer {
    pub fn new() -> Self {
        let schema = FeatureSchema {
            analyzer_key: KEY,
            analyzer_name: "Directional edge statistics",
            features: vec![
                FeatureSpec {
                    key: ABSOLUTE_ANGLE_XY,
                    name: "Absolute angle in xy plane",
                    short_name: "Angle xy",
                    dimension: Dimension::Angle,
                    is_int: false,
                },
                FeatureSpec {
                    key: ABSOLUTE_ANGLE_YZ,
                    name: "Absolute angle in yz plane",
                    short_name: "Angle yz",
                    dimension: Dimension::Angle,
                    is_int: false,
                },
                FeatureSpec {
                    key: ABSOLUTE_ANGLE_ZX,
                    name: "Absolute angle in zx plane",
                    short_name: "Angle zx",
                    dimension: Dimension::Angle,
                    is_int: false,
                },
                FeatureSpec {
                    key: DIRECTIONAL_CHANGE_RATE,
                    name: "Directional change rate",
                    short_name: "Dir. change rate",
                    dimension: Dimension::Rate,
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

impl FeatureAnalyzer for DirectionalEdgeAnalyzer {
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

impl EdgeAnalyzer for DirectionalEdgeAnalyzer {
    fn process(
        &mut self,
        edges: &[EdgeId],
        graph: &TrackingGraph,
        store: &FeatureStore,
    ) -> Result<(), EngineError> {
        if edges.is_empty() {
            return Ok(());
        }

        let elapsed = dispatch::run_batch(edges, self.config.num_threads(), KEY, |&edge_id| {
            let (source, target) = graph
                .normalized_endpoints(edge_id)
                .ok_or_else(|| EngineError::missing_element(edge_id))?;
            let displacement = target.position - source.position;

            store.put_edge_feature(
                edge_id,
                ABSOLUTE_ANGLE_XY,
                geometry::absolute_angle_xy(&displacement),
            );
            store.put_edge_feature(
                edge_id,
                ABSOLUTE_ANGLE_YZ,
                geometry::absolute_angle_yz(&displacement),
            );
            store.put_edge_feature(
                edge_id,
                ABSOLUTE_ANGLE_ZX,
                geometry::absolute_angle_zx(&displacement),
            );

            // Directional change needs the unique previous edge, reached
            // through the source spot. Zero predecessors = track root,
            // several = branch point; both leave the rate undefined.
            let predecessors = graph.predecessors_of(source.id);
            let rate = if predecessors.len() != 1 {
                f64::NAN
            } else {
                let predecessor = graph
                    .spot(predecessors[0])
                    .ok_or_else(|| EngineError::missing_element(predecessors[0]))?;
                let previous = source.position - predecessor.position;
                geometry::angle_between(&previous, &displacement) / (target.t - source.t)
            };
            store.put_edge_feature(edge_id, DIRECTIONAL_CHANGE_RATE, rate);
            Ok(())
        })?;

        self.config.record(elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, SpotId};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::f64::consts::PI;

    fn spot(b: &mut GraphBuilder, x: f64, y: f64, z: f64, frame: i32) -> SpotId {
        b.add_spot(Vector3::new(x, y, z), frame, frame as f64, 1.0, 1.0)
    }

    fn run(graph: &TrackingGraph) -> FeatureStore {
        let store = FeatureStore::new();
        let mut analyzer = DirectionalEdgeAnalyzer::new();
        analyzer.set_num_threads(2).unwrap();
        analyzer.process(&graph.edge_ids(), graph, &store).unwrap();
        store
    }

    #[test]
    fn test_absolute_angles() {
        let mut b = GraphBuilder::new();
        let s0 = spot(&mut b, 0.0, 0.0, 0.0, 0);
        let s1 = spot(&mut b, 1.0, 1.0, 0.0, 1);
        let e = b.add_edge(s0, s1);
        let store = run(&b.build());

        assert_relative_eq!(
            store.edge_feature(e, ABSOLUTE_ANGLE_XY).unwrap(),
            PI / 4.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            store.edge_feature(e, ABSOLUTE_ANGLE_YZ).unwrap(),
            0.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            store.edge_feature(e, ABSOLUTE_ANGLE_ZX).unwrap(),
            PI / 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_backwards_declared_edge_is_normalized() {
        // Same geometry twice; the second edge declares its endpoints in
        // reverse time order. Angles must match the time-forward direction
        // in both cases.
        let mut b = GraphBuilder::new();
        let s0 = spot(&mut b, 0.0, 0.0, 0.0, 0);
        let s1 = spot(&mut b, 0.0, 2.0, 0.0, 1);
        let forward = b.add_edge(s0, s1);
        let t0 = spot(&mut b, 10.0, 0.0, 0.0, 0);
        let t1 = spot(&mut b, 10.0, 2.0, 0.0, 1);
        let backward = b.add_edge(t1, t0);
        let store = run(&b.build());

        let fwd = store.edge_feature(forward, ABSOLUTE_ANGLE_XY).unwrap();
        let bwd = store.edge_feature(backward, ABSOLUTE_ANGLE_XY).unwrap();
        assert_relative_eq!(fwd, PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(bwd, fwd, epsilon = 1e-9);
    }

    #[test]
    fn test_root_edge_rate_is_nan() {
        let mut b = GraphBuilder::new();
        let s0 = spot(&mut b, 0.0, 0.0, 0.0, 0);
        let s1 = spot(&mut b, 1.0, 0.0, 0.0, 1);
        let e = b.add_edge(s0, s1);
        let store = run(&b.build());

        assert!(store.edge_feature(e, DIRECTIONAL_CHANGE_RATE).unwrap().is_nan());
    }

    #[test]
    fn test_branch_point_rate_is_nan() {
        // Two branches merge into one spot; the outgoing edge's source has
        // two predecessors.
        let mut b = GraphBuilder::new();
        let left = spot(&mut b, -1.0, 0.0, 0.0, 0);
        let right = spot(&mut b, 1.0, 0.0, 0.0, 0);
        let merge = spot(&mut b, 0.0, 1.0, 0.0, 1);
        let out = spot(&mut b, 0.0, 2.0, 0.0, 2);
        b.add_edge(left, merge);
        b.add_edge(right, merge);
        let e = b.add_edge(merge, out);
        let store = run(&b.build());

        assert!(store.edge_feature(e, DIRECTIONAL_CHANGE_RATE).unwrap().is_nan());
    }

    #[test]
    fn test_unique_predecessor_gives_finite_rate() {
        // 90 degree turn over one frame: rate = (pi/2) / 1.
        let mut b = GraphBuilder::new();
        let s0 = spot(&mut b, 0.0, 0.0, 0.0, 0);
        let s1 = spot(&mut b, 1.0, 0.0, 0.0, 1);
        let s2 = spot(&mut b, 1.0, 1.0, 0.0, 2);
        b.add_edge(s0, s1);
        let e = b.add_edge(s1, s2);
        let store = run(&b.build());

        assert_relative_eq!(
            store.edge_feature(e, DIRECTIONAL_CHANGE_RATE).unwrap(),
            PI / 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut b = GraphBuilder::new();
        let s0 = spot(&mut b, 0.0, 0.0, 0.0, 0);
        let s1 = spot(&mut b, 1.0, 0.0, 0.0, 1);
        b.add_edge(s0, s1);
        let graph = b.build();

        let store = FeatureStore::new();
        let mut analyzer = DirectionalEdgeAnalyzer::new();
        analyzer.process(&[], &graph, &store).unwrap();
        assert!(store.is_empty());
        assert_eq!(analyzer.processing_time(), Duration::ZERO);
    }
}
