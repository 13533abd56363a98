//! TrackStat test-drive CLI
//!
//! Builds a small two-track demo scene (one straight run, one
//! straight-then-turn run), pushes it through the built-in analyzer
//! pipeline, and prints the resulting feature table.

use clap::Parser;
use nalgebra::Vector3;
use std::path::PathBuf;
use trackstat_core::analyzers::{track_duration, track_motion, track_speed};
use trackstat_core::{FeatureEngine, GraphBuilder, SpotId, TrackingGraph};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "trackstat-sim", about = "Test drive for the TrackStat feature-analysis engine")]
struct Args {
    /// Worker threads per analyzer (default: hardware parallelism)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Write a JSON snapshot of the feature store to this path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Enable debug logging (per-analyzer batch telemetry)
    #[arg(short, long)]
    verbose: bool,
}

const TRACK_FEATURES: &[&str] = &[
    track_duration::TRACK_DURATION,
    track_duration::TRACK_DISPLACEMENT,
    track_speed::TRACK_MEAN_SPEED,
    track_motion::TOTAL_DISTANCE_TRAVELED,
    track_motion::MAX_DISTANCE_TRAVELED,
    track_motion::CONFINEMENT_RATIO,
    track_motion::MEAN_STRAIGHT_LINE_SPEED,
    track_motion::LINEARITY_OF_FORWARD_PROGRESSION,
    track_motion::MEAN_DIRECTIONAL_CHANGE_RATE,
    track_motion::TOTAL_ABSOLUTE_ANGLE_XY,
];

fn add_track(builder: &mut GraphBuilder, points: &[(f64, f64)]) {
    let mut previous: Option<SpotId> = None;
    for (frame, (x, y)) in points.iter().enumerate() {
        let spot = builder.add_spot(
            Vector3::new(*x, *y, 0.0),
            frame as i32,
            frame as f64,
            1.0,
            1.0,
        );
        if let Some(p) = previous {
            builder.add_edge(p, spot);
        }
        previous = Some(spot);
    }
}

fn demo_graph() -> TrackingGraph {
    let mut builder = GraphBuilder::new();
    // Straight run up the y axis.
    add_track(
        &mut builder,
        &[(1.0, 1.0), (1.0, 2.0), (1.0, 3.0), (1.0, 4.0), (1.0, 5.0)],
    );
    // Straight along x, then a sharp turn on the last frame.
    add_track(
        &mut builder,
        &[(4.0, 2.0), (6.0, 2.0), (8.0, 2.0), (9.0, 2.0), (10.0, 8.0)],
    );
    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let graph = demo_graph();
    info!(
        spots = graph.n_spots(),
        edges = graph.n_edges(),
        tracks = graph.n_tracks(),
        "demo graph built"
    );

    let mut engine = FeatureEngine::with_default_analyzers()?;
    if let Some(threads) = args.threads {
        engine.set_num_threads(threads)?;
    }
    engine.analyze_all(&graph)?;

    for track in graph.track_ids() {
        info!("--- {track} ---");
        for key in TRACK_FEATURES {
            let spec = engine.schema_of(key)?;
            match engine.track_feature(track, key)? {
                Some(value) => info!("{:<40} {:>12.6}", spec.name, value),
                None => info!("{:<40} {:>12}", spec.name, "absent"),
            }
        }
    }

    if let Some(path) = args.export {
        let snapshot = engine.store().snapshot();
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        info!(path = %path.display(), "feature snapshot exported");
    }

    Ok(())
}
