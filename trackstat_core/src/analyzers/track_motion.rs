//! Linear-motion statistics per track: path length, confinement, straight
//! line speed, linearity of forward progression, mean directional change,
//! and the net-displacement angle in the xy plane.
//!
//! Reads `TRACK_DISPLACEMENT`, `TRACK_DURATION` and `TRACK_MEAN_SPEED`
//! written by the duration and speed analyzers, so it must be registered
//! at a higher rank than both. Divisions by zero are deliberately
//! unguarded: a zero path length or duration propagates IEEE-754 NaN/inf
//! into the derived ratios.

use crate::analyzer::{
    Dimension, FeatureAnalyzer, FeatureSchema, FeatureSpec, TrackAnalyzer, WorkerConfig,
};
use crate::analyzers::track_duration::{TRACK_DISPLACEMENT, TRACK_DURATION};
use crate::analyzers::track_speed::TRACK_MEAN_SPEED;
use crate::dispatch;
use crate::error::EngineError;
use crate::feature_store::{FeatureKey, FeatureStore};
use crate::geometry;
use crate::graph::{TrackId, TrackingGraph};
use std::time::Duration;

pub const KEY: &str = "Linear track analysis";

pub const TOTAL_DISTANCE_TRAVELED: &str = "TOTAL_DISTANCE_TRAVELED";
pub const MAX_DISTANCE_TRAVELED: &str = "MAX_DISTANCE_TRAVELED";
pub const CONFINEMENT_RATIO: &str = "CONFINEMENT_RATIO";
pub const MEAN_STRAIGHT_LINE_SPEED: &str = "MEAN_STRAIGHT_LINE_SPEED";
pub const LINEARITY_OF_FORWARD_PROGRESSION: &str = "LINEARITY_OF_FORWARD_PROGRESSION";
pub const MEAN_DIRECTIONAL_CHANGE_RATE: &str = "MEAN_DIRECTIONAL_CHANGE_RATE";
pub const TOTAL_ABSOLUTE_ANGLE_XY: &str = "TOTAL_ABSOLUTE_ANGLE_XY";

/// Track analyzer for linear-motion statistics.
pub struct LinearTrackAnalyzer {
    schema: FeatureSchema,
    config: WorkerConfig,
}

impl Default for LinearTrackAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearTrackAnalyzer {
    pub fn new() -> Self {
        let schema = FeatureSchema {
            analyzer_key: KEY,
            analyzer_name: "Linear track analysis",
            features: vec![
                FeatureSpec {
                    key: TOTAL_DISTANCE_TRAVELED,
                    name: "Total distance traveled",
                    short_name: "Total dist.",
                    dimension: Dimension::Length,
                    is_int: false,
                },
                FeatureSpec {
                    key: MAX_DISTANCE_TRAVELED,
                    name: "Max distance traveled",
                    short_name: "Max dist.",
                    dimension: Dimension::Length,
                    is_int: false,
                },
                FeatureSpec {
                    key: CONFINEMENT_RATIO,
                    name: "Confinement ratio",
                    short_name: "Cfn. ratio",
                    dimension: Dimension::Dimensionless,
                    is_int: false,
                },
                FeatureSpec {
                    key: MEAN_STRAIGHT_LINE_SPEED,
                    name: "Mean straight line speed",
                    short_name: "Mean v. line",
                    dimension: Dimension::Velocity,
                    is_int: false,
                },
                FeatureSpec {
                    key: LINEARITY_OF_FORWARD_PROGRESSION,
                    name: "Linearity of forward progression",
                    short_name: "Lin. fwd. progr.",
                    dimension: Dimension::Dimensionless,
                    is_int: false,
                },
                FeatureSpec {
                    key: MEAN_DIRECTIONAL_CHANGE_RATE,
                    name: "Mean directional change rate",
                    short_name: "Mean dir. change",
                    dimension: Dimension::Rate,
                    is_int: false,
                },
                FeatureSpec {
                    key: TOTAL_ABSOLUTE_ANGLE_XY,
                    name: "Absolute angle of net displacement in xy plane",
                    short_name: "Net angle xy",
                    dimension: Dimension::Angle,
                    is_int: false,
                },
            ],
            dependencies: vec![TRACK_DISPLACEMENT, TRACK_DURATION, TRACK_MEAN_SPEED],
        };
        Self {
            schema,
            config: WorkerConfig::new(),
        }
    }
}

fn read_dependency(
    store: &FeatureStore,
    track: TrackId,
    key: FeatureKey,
) -> Result<f64, EngineError> {
    store
        .track_feature(track, key)
        .ok_or_else(|| EngineError::UnsatisfiedDependency {
            analyzer: KEY.to_string(),
            feature: key.to_string(),
        })
}

impl FeatureAnalyzer for LinearTrackAnalyzer {
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

impl TrackAnalyzer for LinearTrackAnalyzer {
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
            let first = graph
                .first_spot_of(track_id)
                .ok_or_else(|| EngineError::missing_element(track_id))?;
            let last = graph
                .last_spot_of(track_id)
                .ok_or_else(|| EngineError::missing_element(track_id))?;

            let mut total_distance = 0.0;
            let mut max_distance = 0.0f64;
            let mut sum_angle_rate = 0.0;
            let mut n_angle_rate = 0usize;

            for &edge_id in &track.edges {
                let (source, target) = graph
                    .normalized_endpoints(edge_id)
                    .ok_or_else(|| EngineError::missing_element(edge_id))?;

                total_distance += (target.position - source.position).norm();
                max_distance = max_distance.max((target.position - first.position).norm());

                // Directional change measured against the track's first
                // spot. An edge qualifies only when its source has exactly
                // one predecessor; roots and branch points are excluded
                // from the mean rather than stored as NaN.
                let predecessors = graph.predecessors_of(source.id);
                if predecessors.len() == 1 {
                    let predecessor = graph
                        .spot(predecessors[0])
                        .ok_or_else(|| EngineError::missing_element(predecessors[0]))?;
                    let from_predecessor = first.position - predecessor.position;
                    let from_first = target.position - first.position;
                    let delta = geometry::angle_between(&from_predecessor, &from_first);
                    sum_angle_rate += delta / (target.t - first.t);
                    n_angle_rate += 1;
                }
            }

            // Features committed by lower-rank analyzers.
            let net_distance = read_dependency(store, track_id, TRACK_DISPLACEMENT)?;
            let total_time = read_dependency(store, track_id, TRACK_DURATION)?;
            let mean_speed = read_dependency(store, track_id, TRACK_MEAN_SPEED)?;

            let confinement_ratio = net_distance / total_distance;
            let mean_straight_line_speed = net_distance / total_time;
            let linearity = mean_straight_line_speed / mean_speed;
            let mean_angle_rate = sum_angle_rate / n_angle_rate as f64;

            let net_xy = last.position - first.position;
            let net_angle_xy = geometry::absolute_angle_xy(&net_xy);

            store.put_track_feature(track_id, TOTAL_DISTANCE_TRAVELED, total_distance);
            store.put_track_feature(track_id, MAX_DISTANCE_TRAVELED, max_distance);
            store.put_track_feature(track_id, CONFINEMENT_RATIO, confinement_ratio);
            store.put_track_feature(track_id, MEAN_STRAIGHT_LINE_SPEED, mean_straight_line_speed);
            store.put_track_feature(track_id, LINEARITY_OF_FORWARD_PROGRESSION, linearity);
            store.put_track_feature(track_id, MEAN_DIRECTIONAL_CHANGE_RATE, mean_angle_rate);
            store.put_track_feature(track_id, TOTAL_ABSOLUTE_ANGLE_XY, net_angle_xy);
            Ok(())
        })?;

        self.config.record(elapsed);
        Ok(())
    }
}
