//! Owns clusters and cluster transitions; answers lookups and bounded shortest-path queries.
//!
//! Clusters and transitions are allocated from flat arenas (`Vec<Cluster>` / `Vec<ClusterTransition>`)
//! addressed by stable [`ClusterId`]/[`TransitionId`] indices rather than raw pointers, following
//! the index-based-arena pattern this crate uses throughout for cross-component references (see
//! the crate's design notes). Every cluster's outgoing transitions form an intrusive singly-linked
//! list through [`ClusterTransition::next_in_source_list`], kept sorted by ascending `distance`.

mod cluster;
mod transition;

pub use cluster::{Cluster, ClusterId};
pub use transition::{ClusterTransition, TransitionId};

use std::collections::HashMap;

use crate::geometry::{matrix_approx_eq, matrix_is_identity, Matrix3, TRANSITION_MATRIX_EPSILON};
use crate::structure::CrystalStructure;

/// The maximum number of hops [`ClusterGraph::determine_cluster_transition`] will search before
/// giving up and caching the pair as disconnected.
///
/// The data structure supports deeper searches; no pipeline configuration currently exercises one,
/// so the search below is a direct two-loop unrolling of a depth-2 BFS rather than a generic one.
pub const MAX_CLUSTER_DISTANCE: u32 = 2;

/// Owns every [`Cluster`] and [`ClusterTransition`] produced while building the grain structure of
/// a configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterGraph {
    clusters: Vec<Cluster>,
    transitions: Vec<ClusterTransition>,
    /// Pairs of non-null clusters proven to have no path of length `<= MAX_CLUSTER_DISTANCE`
    /// between them, canonicalized with the smaller id first.
    disconnected_cache: std::collections::HashSet<(ClusterId, ClusterId)>,
}

impl Default for ClusterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterGraph {
    /// Creates a new graph containing only the null cluster (id 0).
    #[must_use]
    pub fn new() -> Self {
        let null_cluster = Cluster {
            id: ClusterId::NULL,
            structure: CrystalStructure::Other,
            atom_count: 0,
            orientation: Matrix3::identity(),
            symmetry_permutation: None,
            outgoing_head: None,
        };
        Self {
            clusters: vec![null_cluster],
            transitions: Vec::new(),
            disconnected_cache: std::collections::HashSet::new(),
        }
    }

    /// The number of clusters in the graph, including the null cluster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns `true` if the graph contains only the null cluster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.len() <= 1
    }

    /// Creates a new, unconnected cluster of the given structure and returns its id.
    pub fn create_cluster(&mut self, structure: CrystalStructure) -> ClusterId {
        let id = ClusterId(self.clusters.len());
        self.clusters.push(Cluster {
            id,
            structure,
            atom_count: 0,
            orientation: Matrix3::identity(),
            symmetry_permutation: None,
            outgoing_head: None,
        });
        id
    }

    /// Overwrites a cluster's orientation and atom count. Used once, right after its atoms have
    /// been grouped, to install the averaged orientation.
    pub fn set_cluster_orientation_and_count(&mut self, id: ClusterId, orientation: Matrix3, atom_count: usize) {
        let cluster = &mut self.clusters[id.0];
        cluster.orientation = orientation;
        cluster.atom_count = atom_count;
    }

    /// Looks up a cluster by id.
    #[must_use]
    pub fn find_cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0)
    }

    /// Iterates a cluster's outgoing transitions in ascending-distance order.
    pub fn outgoing_transitions(&self, cluster: ClusterId) -> impl Iterator<Item = &ClusterTransition> + '_ {
        let mut next = self.clusters.get(cluster.0).and_then(|c| c.outgoing_head);
        std::iter::from_fn(move || {
            let id = next?;
            let t = &self.transitions[id.0];
            next = t.next_in_source_list;
            Some(t)
        })
    }

    /// Looks up a transition by id.
    #[must_use]
    pub fn transition(&self, id: TransitionId) -> &ClusterTransition {
        &self.transitions[id.0]
    }

    /// Returns `true` if `cluster` has no outgoing transitions besides (optionally) its own
    /// self-transition -- i.e. it is a leaf of the cluster graph.
    #[must_use]
    pub fn is_leaf(&self, cluster: ClusterId) -> bool {
        self.outgoing_transitions(cluster).all(ClusterTransition::is_self_transition)
    }

    /// Ensures `cluster` has a self-transition (identity, distance 0) at the head of its outgoing
    /// list, creating one if absent.
    pub fn create_self_transition(&mut self, cluster: ClusterId) -> TransitionId {
        if let Some(head) = self.clusters[cluster.0].outgoing_head {
            if self.transitions[head.0].is_self_transition() {
                return head;
            }
        }
        let id = TransitionId(self.transitions.len());
        self.transitions.push(ClusterTransition {
            id,
            source: cluster,
            destination: cluster,
            tm: Matrix3::identity(),
            reverse: id,
            distance: 0,
            area: 0,
            next_in_source_list: self.clusters[cluster.0].outgoing_head,
        });
        self.clusters[cluster.0].outgoing_head = Some(id);
        id
    }

    /// Creates (or finds an existing) transition from `a` to `b` with matrix `tm`.
    ///
    /// If `a == b` and `tm` is the identity within [`TRANSITION_MATRIX_EPSILON`], this returns
    /// `a`'s self-transition. Otherwise, if `a`'s outgoing list already has a transition to `b`
    /// whose matrix matches `tm` element-wise within the same tolerance, that transition is
    /// returned. Only when neither shortcut applies are a new forward and reverse transition pair
    /// allocated.
    pub fn create_cluster_transition(&mut self, a: ClusterId, b: ClusterId, tm: Matrix3, distance: u32) -> TransitionId {
        if a == b && matrix_is_identity(&tm, TRANSITION_MATRIX_EPSILON) {
            return self.create_self_transition(a);
        }

        if let Some(existing) = self
            .outgoing_transitions(a)
            .find(|t| t.destination == b && matrix_approx_eq(&t.tm, &tm, TRANSITION_MATRIX_EPSILON))
            .map(ClusterTransition::id)
        {
            return existing;
        }

        let forward_id = TransitionId(self.transitions.len());
        let reverse_id = TransitionId(self.transitions.len() + 1);
        let tm_inv = tm.try_inverse().unwrap_or_else(Matrix3::identity);

        self.transitions.push(ClusterTransition {
            id: forward_id,
            source: a,
            destination: b,
            tm,
            reverse: reverse_id,
            distance,
            area: 1,
            next_in_source_list: None,
        });
        self.transitions.push(ClusterTransition {
            id: reverse_id,
            source: b,
            destination: a,
            tm: tm_inv,
            reverse: forward_id,
            distance,
            area: 1,
            next_in_source_list: None,
        });

        self.insert_sorted_by_distance(a, forward_id);
        self.insert_sorted_by_distance(b, reverse_id);

        if distance == 1 {
            self.disconnected_cache.clear();
        }

        forward_id
    }

    /// Registers one observed bond crossing from `a` to `b` with transition matrix `tm`: finds or
    /// creates the distance-1 transition between them and increments its `area` (bond count).
    pub fn register_transition_bond(&mut self, a: ClusterId, b: ClusterId, tm: Matrix3) -> TransitionId {
        let before = self.transitions.len();
        let id = self.create_cluster_transition(a, b, tm, 1);
        if id.0 < before {
            // Found an existing transition rather than allocating a new one: count this bond too.
            let reverse = self.transitions[id.0].reverse;
            self.transitions[id.0].increment_area(1);
            self.transitions[reverse.0].increment_area(1);
        }
        id
    }

    fn insert_sorted_by_distance(&mut self, source: ClusterId, new_id: TransitionId) {
        let new_distance = self.transitions[new_id.0].distance;
        let head = self.clusters[source.0].outgoing_head;

        match head {
            Some(head_id) if self.transitions[head_id.0].distance <= new_distance => {
                // Walk until we find the insertion point after `head`.
                let mut current = head_id;
                loop {
                    let next = self.transitions[current.0].next_in_source_list;
                    match next {
                        Some(next_id) if self.transitions[next_id.0].distance <= new_distance => {
                            current = next_id;
                        }
                        _ => break,
                    }
                }
                self.transitions[new_id.0].next_in_source_list = self.transitions[current.0].next_in_source_list;
                self.transitions[current.0].next_in_source_list = Some(new_id);
            }
            _ => {
                self.transitions[new_id.0].next_in_source_list = head;
                self.clusters[source.0].outgoing_head = Some(new_id);
            }
        }
    }

    /// Finds a transition relating `a` to `b`, searching up to [`MAX_CLUSTER_DISTANCE`] hops and
    /// caching both positive and negative results.
    ///
    /// The query pair is canonicalized (smaller id first) before consulting the disconnected-pair
    /// cache, so the search itself is path-deterministic; the returned transition's reverse is
    /// handed back when the canonical direction does not match the request.
    pub fn determine_cluster_transition(&mut self, a: ClusterId, b: ClusterId) -> Option<TransitionId> {
        if a == b {
            return Some(self.create_self_transition(a));
        }

        if let Some(direct) = self.outgoing_transitions(a).find(|t| t.destination == b).map(ClusterTransition::id) {
            return Some(direct);
        }

        if self.is_leaf(a) || self.is_leaf(b) {
            return None;
        }

        let (lo, hi, swapped) = if a.0 < b.0 { (a, b, false) } else { (b, a, true) };

        if self.disconnected_cache.contains(&(lo, hi)) {
            return None;
        }

        if let Some(found) = self.search_bounded(lo, hi) {
            let cached = self.create_cluster_transition(lo, hi, found.0, found.1);
            return Some(if swapped { self.transitions[cached.0].reverse } else { cached });
        }

        self.disconnected_cache.insert((lo, hi));
        None
    }

    /// A direct two-loop unrolling of a depth-[`MAX_CLUSTER_DISTANCE`] BFS from `lo` to `hi`,
    /// returning the matrix and total distance of the shortest path found, scanning every
    /// candidate path rather than stopping at the first: a later `t1` with a larger own distance
    /// can still pair with a much shorter `t2` for a smaller total than an earlier match.
    fn search_bounded(&self, lo: ClusterId, hi: ClusterId) -> Option<(Matrix3, u32)> {
        debug_assert_eq!(MAX_CLUSTER_DISTANCE, 2, "search_bounded is specialized for depth 2");

        let mut best: Option<(Matrix3, u32)> = None;

        for t1 in self.outgoing_transitions(lo) {
            if t1.is_self_transition() {
                continue;
            }
            if t1.destination == hi && best.map_or(true, |(_, d)| t1.distance < d) {
                best = Some((t1.tm, t1.distance));
            }
            for t2 in self.outgoing_transitions(t1.destination) {
                if t2.is_self_transition() {
                    continue;
                }
                if t2.destination == hi {
                    let distance = t1.distance + t2.distance;
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((t2.tm * t1.tm, distance));
                    }
                }
            }
        }
        best
    }

    /// Folds two transitions `a->b` and `b->c` into a single `a->c` transition.
    ///
    /// Detects the degenerate `A -> B -> A` case and returns `A`'s self-transition directly rather
    /// than creating a spurious distance-2 self-loop.
    pub fn concatenate_cluster_transitions(&mut self, t_ab: TransitionId, t_bc: TransitionId) -> TransitionId {
        let (a, b1, tm_ab, dist_ab) = {
            let t = &self.transitions[t_ab.0];
            (t.source, t.destination, t.tm, t.distance)
        };
        let (b2, c, tm_bc, dist_bc) = {
            let t = &self.transitions[t_bc.0];
            (t.source, t.destination, t.tm, t.distance)
        };
        debug_assert_eq!(b1, b2, "concatenated transitions must share their middle cluster");

        if self.transitions[t_ab.0].is_self_transition() {
            return t_bc;
        }
        if self.transitions[t_bc.0].is_self_transition() {
            return t_ab;
        }
        if c == a {
            return self.create_self_transition(a);
        }

        self.create_cluster_transition(a, c, tm_bc * tm_ab, dist_ab + dist_bc)
    }
}

/// A lookup table from atom index to cluster id, produced by [`crate::structure::build_cluster_graph`].
pub type AtomClusters = HashMap<usize, ClusterId>;

#[cfg(test)]
mod tests {
    use super::*;

    fn rot_z(theta: f64) -> Matrix3 {
        Matrix3::new(
            theta.cos(),
            -theta.sin(),
            0.0,
            theta.sin(),
            theta.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    #[test]
    fn reverse_of_a_transition_round_trips_to_the_self_transition() {
        let mut g = ClusterGraph::new();
        let a = g.create_cluster(CrystalStructure::Fcc);
        let b = g.create_cluster(CrystalStructure::Fcc);
        let tm = rot_z(std::f64::consts::FRAC_PI_6);
        let t_ab = g.create_cluster_transition(a, b, tm, 1);
        let t_ba = g.transitions[t_ab.0].reverse;

        let self_a = g.concatenate_cluster_transitions(t_ab, t_ba);
        assert!(g.transitions[self_a.0].is_self_transition());
        assert!(matrix_is_identity(&g.transitions[self_a.0].tm, 1e-9));
    }

    #[test]
    fn chained_transitions_compose_in_matrix_order() {
        let mut g = ClusterGraph::new();
        let a = g.create_cluster(CrystalStructure::Fcc);
        let b = g.create_cluster(CrystalStructure::Fcc);
        let c = g.create_cluster(CrystalStructure::Fcc);
        let tm_ab = rot_z(0.1);
        let tm_bc = rot_z(0.2);
        let t_ab = g.create_cluster_transition(a, b, tm_ab, 1);
        let t_bc = g.create_cluster_transition(b, c, tm_bc, 1);

        let t_ac = g.concatenate_cluster_transitions(t_ab, t_bc);
        assert!(matrix_approx_eq(&g.transitions[t_ac.0].tm, &(tm_bc * tm_ab), 1e-9));
        assert_eq!(g.transitions[t_ac.0].distance, 2);
    }

    #[test]
    fn determine_cluster_transition_is_cached_after_first_lookup() {
        let mut g = ClusterGraph::new();
        let a = g.create_cluster(CrystalStructure::Fcc);
        let b = g.create_cluster(CrystalStructure::Fcc);
        let c = g.create_cluster(CrystalStructure::Fcc);
        g.create_cluster_transition(a, b, rot_z(0.1), 1);
        g.create_cluster_transition(b, c, rot_z(0.2), 1);

        let first = g.determine_cluster_transition(a, c).expect("path of length 2 exists");
        let direct_count_before = g.outgoing_transitions(a).count();
        let second = g.determine_cluster_transition(a, c).expect("still reachable");
        let direct_count_after = g.outgoing_transitions(a).count();

        assert_eq!(g.transitions[first.0].destination, c);
        assert_eq!(first.0, second.0);
        assert_eq!(direct_count_before, direct_count_after, "second lookup must not mutate the graph");
    }

    #[test]
    fn determine_cluster_transition_picks_the_shortest_total_distance_path() {
        // a -> y (distance 1) -> d (distance 5): total 6, but a's sorted outgoing list visits
        // y before x, so an implementation that stops at the first successful pair would pick
        // this one even though a -> x (distance 3) -> d (distance 1), total 4, is shorter.
        let mut g = ClusterGraph::new();
        let a = g.create_cluster(CrystalStructure::Fcc);
        let x = g.create_cluster(CrystalStructure::Fcc);
        let y = g.create_cluster(CrystalStructure::Fcc);
        let d = g.create_cluster(CrystalStructure::Fcc);

        let tm_ay = rot_z(0.1);
        let tm_yd = rot_z(0.2);
        let tm_ax = rot_z(0.3);
        let tm_xd = rot_z(0.4);
        g.create_cluster_transition(a, y, tm_ay, 1);
        g.create_cluster_transition(y, d, tm_yd, 5);
        g.create_cluster_transition(a, x, tm_ax, 3);
        g.create_cluster_transition(x, d, tm_xd, 1);

        let t_ad = g.determine_cluster_transition(a, d).expect("path of length 4 exists");
        assert_eq!(g.transitions[t_ad.0].distance, 4);
        assert!(matrix_approx_eq(&g.transitions[t_ad.0].tm, &(tm_xd * tm_ax), 1e-9));
    }

    #[test]
    fn unreachable_pair_is_cached_as_disconnected() {
        let mut g = ClusterGraph::new();
        let a = g.create_cluster(CrystalStructure::Fcc);
        let b = g.create_cluster(CrystalStructure::Bcc);
        g.create_self_transition(a);
        g.create_self_transition(b);
        assert!(g.determine_cluster_transition(a, b).is_none());
        assert!(g.determine_cluster_transition(a, b).is_none());
    }
}
