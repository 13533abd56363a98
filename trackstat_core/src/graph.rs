//! The spot-tracking graph and its read-only query surface.
//!
//! Spots are detections at a given time frame; edges are temporal links
//! between them; tracks are the connected components (lineages). The graph
//! is produced upstream by a tracking pipeline - here it is assembled with
//! [`GraphBuilder`] and frozen into an immutable [`TrackingGraph`] carrying:
//! - a time-directed neighbor index (predecessors/successors of each spot),
//! - the track components, with deterministic track-id assignment.
//!
//! Freezing the graph before analysis is what guarantees that no mutation
//! can race an in-flight analyzer batch: analyzers only ever see a shared
//! reference. Changing the graph means building a new one.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a spot, dense and assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotId(pub u32);

/// Identifier of an edge, dense and assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Identifier of a track. Dense, ordered by the smallest member [`SpotId`],
/// assigned at [`GraphBuilder::build`] time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spot {}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge {}", self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.0)
    }
}

/// A detected object at a specific time frame. Position and time are
/// immutable once inserted; derived numeric features live in the
/// [`FeatureStore`](crate::FeatureStore), not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spot {
    /// Unique identifier
    pub id: SpotId,

    /// Position in physical units
    pub position: Vector3<f64>,

    /// Frame index (ordering key)
    pub frame: i32,

    /// Physical time of the frame (used for rates)
    pub t: f64,

    /// Detection radius
    pub radius: f64,

    /// Detection quality score
    pub quality: f64,
}

/// A temporal link between two spots, kept in its declared orientation.
/// Analyzers normalize orientation by frame order before computing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: SpotId,
    pub target: SpotId,
}

/// A connected component of the graph containing at least one edge.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Member spots, sorted by id
    pub spots: Vec<SpotId>,
    /// Member edges, sorted by id
    pub edges: Vec<EdgeId>,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Accumulates spots and edges, then freezes them into a [`TrackingGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    spots: Vec<Spot>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spot and returns its id.
    pub fn add_spot(
        &mut self,
        position: Vector3<f64>,
        frame: i32,
        t: f64,
        radius: f64,
        quality: f64,
    ) -> SpotId {
        let id = SpotId(self.spots.len() as u32);
        self.spots.push(Spot {
            id,
            position,
            frame,
            t,
            radius,
            quality,
        });
        id
    }

    /// Adds an edge in its declared orientation and returns its id.
    ///
    /// The declared source is allowed to sit later in time than the target;
    /// consumers normalize (invariant: after normalization,
    /// `source.frame <= target.frame`).
    pub fn add_edge(&mut self, source: SpotId, target: SpotId) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { id, source, target });
        id
    }

    /// Freezes the graph: builds the time-directed neighbor index and the
    /// track components.
    pub fn build(self) -> TrackingGraph {
        let n = self.spots.len();

        // Time-directed neighbor index. For each edge, the endpoint earlier
        // in time is the predecessor of the later one, whatever the declared
        // orientation was. Ties on frame fall back to spot id so the
        // direction is stable across runs.
        let mut predecessors: Vec<Vec<SpotId>> = vec![Vec::new(); n];
        let mut successors: Vec<Vec<SpotId>> = vec![Vec::new(); n];
        for edge in &self.edges {
            let (early, late) = order_by_time(&self.spots, edge.source, edge.target);
            predecessors[late.0 as usize].push(early);
            successors[early.0 as usize].push(late);
        }

        // Connected components via union-find over spot ids.
        let mut uf = UnionFind::new(n);
        for edge in &self.edges {
            uf.union(edge.source.0 as usize, edge.target.0 as usize);
        }

        // Group member spots/edges per component root, keeping only
        // components that carry at least one edge.
        let mut component_edges: HashMap<usize, Vec<EdgeId>> = HashMap::new();
        for edge in &self.edges {
            let root = uf.find(edge.source.0 as usize);
            component_edges.entry(root).or_default().push(edge.id);
        }
        let mut component_spots: HashMap<usize, Vec<SpotId>> = HashMap::new();
        for spot in &self.spots {
            let root = uf.find(spot.id.0 as usize);
            if component_edges.contains_key(&root) {
                component_spots.entry(root).or_default().push(spot.id);
            }
        }

        // Deterministic track ids: sort components by their smallest member
        // spot id and number them densely.
        let mut roots: Vec<usize> = component_edges.keys().copied().collect();
        roots.sort_by_key(|root| component_spots[root].iter().min().copied());

        let mut tracks = Vec::with_capacity(roots.len());
        let mut track_of_spot: Vec<Option<TrackId>> = vec![None; n];
        for (index, root) in roots.into_iter().enumerate() {
            let id = TrackId(index as u32);
            let mut spots = component_spots.remove(&root).unwrap_or_default();
            let mut edges = component_edges.remove(&root).unwrap_or_default();
            spots.sort_unstable();
            edges.sort_unstable();
            for spot in &spots {
                track_of_spot[spot.0 as usize] = Some(id);
            }
            tracks.push(Track { id, spots, edges });
        }

        TrackingGraph {
            spots: self.spots,
            edges: self.edges,
            predecessors,
            successors,
            tracks,
            track_of_spot,
        }
    }
}

fn order_by_time(spots: &[Spot], a: SpotId, b: SpotId) -> (SpotId, SpotId) {
    let sa = &spots[a.0 as usize];
    let sb = &spots[b.0 as usize];
    if (sa.frame, sa.id) <= (sb.frame, sb.id) {
        (a, b)
    } else {
        (b, a)
    }
}

// =============================================================================
// FROZEN GRAPH
// =============================================================================

/// Immutable snapshot of the tracking graph, with the neighbor index and
/// track components precomputed. All accessors are `&self`; the graph is
/// `Sync` and shared by reference across analyzer workers.
#[derive(Debug)]
pub struct TrackingGraph {
    spots: Vec<Spot>,
    edges: Vec<Edge>,
    predecessors: Vec<Vec<SpotId>>,
    successors: Vec<Vec<SpotId>>,
    tracks: Vec<Track>,
    track_of_spot: Vec<Option<TrackId>>,
}

impl TrackingGraph {
    pub fn n_spots(&self) -> usize {
        self.spots.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn n_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(id.0 as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0 as usize)
    }

    /// The track a spot belongs to, if any (singleton spots belong to none).
    pub fn track_of(&self, id: SpotId) -> Option<TrackId> {
        self.track_of_spot.get(id.0 as usize).copied().flatten()
    }

    /// All edge ids, in insertion order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.iter().map(|e| e.id).collect()
    }

    /// All track ids, in id order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    /// Spots linked to `id` by an edge arriving from an earlier frame.
    pub fn predecessors_of(&self, id: SpotId) -> &[SpotId] {
        self.predecessors
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Spots linked to `id` by an edge leaving toward a later frame.
    pub fn successors_of(&self, id: SpotId) -> &[SpotId] {
        self.successors
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Endpoints of an edge in time-forward order, whatever the declared
    /// orientation. After this call `source.frame <= target.frame` (ties
    /// broken by spot id).
    pub fn normalized_endpoints(&self, id: EdgeId) -> Option<(&Spot, &Spot)> {
        let edge = self.edge(id)?;
        let a = self.spot(edge.source)?;
        let b = self.spot(edge.target)?;
        if (a.frame, a.id) <= (b.frame, b.id) {
            Some((a, b))
        } else {
            Some((b, a))
        }
    }

    /// The track's first spot: minimum `(frame, id)` among its members.
    /// The id tie-break makes the choice stable when several spots share
    /// the minimum frame.
    pub fn first_spot_of(&self, id: TrackId) -> Option<&Spot> {
        let track = self.track(id)?;
        track
            .spots
            .iter()
            .filter_map(|s| self.spot(*s))
            .min_by_key(|s| (s.frame, s.id))
    }

    /// The track's last spot: maximum `(frame, id)` among its members.
    pub fn last_spot_of(&self, id: TrackId) -> Option<&Spot> {
        let track = self.track(id)?;
        track
            .spots
            .iter()
            .filter_map(|s| self.spot(*s))
            .max_by_key(|s| (s.frame, s.id))
    }
}

// =============================================================================
// UNION-FIND
// =============================================================================

/// Minimal union-find with path halving, used only during `build`.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Attach the larger root under the smaller one so component
            // roots stay deterministic regardless of edge insertion order.
            if ra < rb {
                self.parent[rb] = ra;
            } else {
                self.parent[ra] = rb;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot_at(b: &mut GraphBuilder, x: f64, y: f64, frame: i32) -> SpotId {
        b.add_spot(Vector3::new(x, y, 0.0), frame, frame as f64, 1.0, 1.0)
    }

    #[test]
    fn test_two_components_get_two_tracks() {
        let mut b = GraphBuilder::new();
        let a0 = spot_at(&mut b, 0.0, 0.0, 0);
        let a1 = spot_at(&mut b, 0.0, 1.0, 1);
        let b0 = spot_at(&mut b, 5.0, 0.0, 0);
        let b1 = spot_at(&mut b, 5.0, 1.0, 1);
        b.add_edge(a0, a1);
        b.add_edge(b0, b1);
        let g = b.build();

        assert_eq!(g.n_tracks(), 2);
        assert_eq!(g.track_of(a0), Some(TrackId(0)));
        assert_eq!(g.track_of(b1), Some(TrackId(1)));
    }

    #[test]
    fn test_singleton_spot_has_no_track() {
        let mut b = GraphBuilder::new();
        let lone = spot_at(&mut b, 9.0, 9.0, 3);
        let a0 = spot_at(&mut b, 0.0, 0.0, 0);
        let a1 = spot_at(&mut b, 0.0, 1.0, 1);
        b.add_edge(a0, a1);
        let g = b.build();

        assert_eq!(g.n_tracks(), 1);
        assert_eq!(g.track_of(lone), None);
    }

    #[test]
    fn test_neighbor_index_ignores_declared_orientation() {
        let mut b = GraphBuilder::new();
        let s0 = spot_at(&mut b, 0.0, 0.0, 0);
        let s1 = spot_at(&mut b, 1.0, 0.0, 1);
        // Declared backwards: source is the later spot.
        b.add_edge(s1, s0);
        let g = b.build();

        assert_eq!(g.predecessors_of(s1), &[s0]);
        assert_eq!(g.successors_of(s0), &[s1]);
        assert!(g.predecessors_of(s0).is_empty());
    }

    #[test]
    fn test_branch_point_has_two_successors() {
        let mut b = GraphBuilder::new();
        let root = spot_at(&mut b, 0.0, 0.0, 0);
        let left = spot_at(&mut b, -1.0, 1.0, 1);
        let right = spot_at(&mut b, 1.0, 1.0, 1);
        b.add_edge(root, left);
        b.add_edge(root, right);
        let g = b.build();

        assert_eq!(g.successors_of(root).len(), 2);
        assert_eq!(g.predecessors_of(left), &[root]);
        assert_eq!(g.predecessors_of(right), &[root]);
    }

    #[test]
    fn test_first_spot_tie_break_on_equal_frame() {
        let mut b = GraphBuilder::new();
        // Two spots on frame 0; the lower id must win every run.
        let s0 = spot_at(&mut b, 1.0, 0.0, 0);
        let s1 = spot_at(&mut b, 2.0, 0.0, 0);
        let s2 = spot_at(&mut b, 1.5, 1.0, 1);
        b.add_edge(s0, s2);
        b.add_edge(s1, s2);
        let g = b.build();

        assert_eq!(g.first_spot_of(TrackId(0)).map(|s| s.id), Some(s0));
        assert_eq!(g.last_spot_of(TrackId(0)).map(|s| s.id), Some(s2));
    }

    #[test]
    fn test_track_ids_ordered_by_smallest_spot() {
        let mut b = GraphBuilder::new();
        // Insert the second component's spots first.
        let b0 = spot_at(&mut b, 5.0, 0.0, 0);
        let b1 = spot_at(&mut b, 5.0, 1.0, 1);
        let a0 = spot_at(&mut b, 0.0, 0.0, 0);
        let a1 = spot_at(&mut b, 0.0, 1.0, 1);
        // Edge insertion order reversed as well.
        b.add_edge(a0, a1);
        b.add_edge(b0, b1);
        let g = b.build();

        // Track 0 is the component containing the smallest spot id (b0).
        assert_eq!(g.track_of(b0), Some(TrackId(0)));
        assert_eq!(g.track_of(a0), Some(TrackId(1)));
    }
}
