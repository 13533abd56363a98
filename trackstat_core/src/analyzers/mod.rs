//! Built-in analyzers.
//!
//! Ranks used by the default pipeline: the duration and speed analyzers
//! run first (rank 0), the linear-motion analyzer reads their output and
//! runs after them (rank 1). The directional edge analyzer has no
//! dependencies.

pub mod edge_direction;
pub mod track_duration;
pub mod track_motion;
pub mod track_speed;

pub use edge_direction::DirectionalEdgeAnalyzer;
pub use track_duration::TrackDurationAnalyzer;
pub use track_motion::LinearTrackAnalyzer;
pub use track_speed::TrackSpeedAnalyzer;
