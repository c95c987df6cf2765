//! The `BurgersCircuit` ring: a closed walk of half-edges linked in place through
//! [`crate::interface_mesh::InterfaceHalfEdge::next_circuit_edge`], plus the closure tests that
//! decide whether a candidate ring actually encloses a dislocation.

use crate::cluster_graph::ClusterGraph;
use crate::geometry::{Matrix3, Vector3, LATTICE_VECTOR_EPSILON, TRANSITION_MATRIX_EPSILON};
use crate::interface_mesh::{CircuitId, HalfEdgeId, InterfaceMesh};

use super::NodeId;

/// A closed ring of interface-mesh half-edges enclosing a dislocation core.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BurgersCircuit {
    pub(crate) first_edge: HalfEdgeId,
    pub(crate) edge_count: usize,
    pub(crate) owner: NodeId,
    /// Preliminary line points appended while tracing, trimmed off on finalization.
    pub(crate) preliminary_points: usize,
    /// Snapshot of the ring's edges taken once tracing halts, for the defect mesh's caps.
    pub(crate) mesh_cap: Vec<HalfEdgeId>,
    pub(crate) is_dangling: bool,
    pub(crate) is_completely_blocked: bool,
    /// `true` for circuits found by primary search (§4.5.1); `false` for secondary, gap-filling
    /// circuits (§4.5.6 pass A). Only primary circuits flag the faces they consume.
    pub(crate) is_primary: bool,
}

impl BurgersCircuit {
    /// The first edge of the ring; a stable entry point for traversal.
    #[must_use]
    pub const fn first_edge(&self) -> HalfEdgeId {
        self.first_edge
    }

    /// The cached edge count (kept in sync with every relink).
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// The node this circuit is tracing from.
    #[must_use]
    pub const fn owner(&self) -> NodeId {
        self.owner
    }

    /// `true` while this circuit's owning node has not yet been merged into a junction.
    #[must_use]
    pub const fn is_dangling(&self) -> bool {
        self.is_dangling
    }

    /// `true` if every edge of this ring already has its opposite claimed by another circuit.
    #[must_use]
    pub const fn is_completely_blocked(&self) -> bool {
        self.is_completely_blocked
    }

    /// The edges captured when tracing halted, used to cap this circuit in the defect mesh.
    #[must_use]
    pub fn mesh_cap(&self) -> &[HalfEdgeId] {
        &self.mesh_cap
    }

    /// `true` if this circuit came from primary search rather than secondary gap-filling.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.is_primary
    }
}

/// Iterates the edges of the ring starting at `first`, following `next_circuit_edge`.
pub(super) fn ring_edges(mesh: &InterfaceMesh, first: HalfEdgeId) -> impl Iterator<Item = HalfEdgeId> + '_ {
    let mut next = Some(first);
    let mut started = false;
    std::iter::from_fn(move || {
        let cur = next?;
        if started && cur == first {
            next = None;
            return None;
        }
        started = true;
        next = mesh.half_edge(cur).next_circuit_edge();
        Some(cur)
    })
}

/// Counts the edges of the ring starting at `first` by direct traversal (used to keep
/// `edge_count` honest after a relink).
#[must_use]
pub(super) fn count_ring_edges(mesh: &InterfaceMesh, first: HalfEdgeId) -> usize {
    ring_edges(mesh, first).count()
}

/// Marks every edge of the ring as belonging to `circuit`, linking them via `next_circuit_edge`
/// in the order given.
pub(super) fn link_ring(mesh: &mut InterfaceMesh, edges: &[HalfEdgeId], circuit: CircuitId) {
    for (i, &e) in edges.iter().enumerate() {
        let next = edges[(i + 1) % edges.len()];
        let he = mesh.half_edge_mut(e);
        he.circuit = Some(circuit);
        he.next_circuit_edge = Some(next);
    }
}

/// Clears `circuit` ownership and ring links from every edge of the ring starting at `first`.
pub(super) fn unlink_ring(mesh: &mut InterfaceMesh, first: HalfEdgeId) {
    let edges: Vec<_> = ring_edges(mesh, first).collect();
    for e in edges {
        let he = mesh.half_edge_mut(e);
        he.circuit = None;
        he.next_circuit_edge = None;
    }
}

/// Sums the (minimum-image) physical displacement around the ring; must be `~0` for a ring that
/// does not wrap around the periodic cell.
#[must_use]
pub(super) fn sum_physical_vector(mesh: &InterfaceMesh, first: HalfEdgeId) -> Vector3 {
    ring_edges(mesh, first).map(|e| *mesh.half_edge(e).physical_vector()).sum()
}

/// Accumulates a walk's cluster vectors and cluster transitions into a single (Burgers vector,
/// Frank rotation) pair, expressed in the frame of its first edge.
///
/// Mirrors [`crate::elastic_mapping::is_elastic_mapping_compatible`]'s face walk: the running
/// Burgers residue and Frank rotation are both updated by each edge's `(vector, transition)` pair
/// in turn.
#[must_use]
pub(super) fn burgers_and_frank_over(mesh: &InterfaceMesh, graph: &ClusterGraph, edges: impl IntoIterator<Item = HalfEdgeId>) -> (Vector3, Matrix3) {
    let mut burgers = Vector3::zeros();
    let mut frank = Matrix3::identity();
    let mut first_iter = true;
    for e in edges {
        let he = mesh.half_edge(e);
        let tm = *graph.transition(he.cluster_transition()).tm();
        let step = *he.cluster_vector().local_vec();
        if first_iter {
            burgers = step;
            frank = tm;
            first_iter = false;
        } else {
            burgers += step;
            frank = tm * frank;
        }
    }
    (burgers, frank)
}

/// Same as [`burgers_and_frank_over`] but for a ring already linked into the mesh.
#[must_use]
pub(super) fn burgers_and_frank(mesh: &InterfaceMesh, graph: &ClusterGraph, first: HalfEdgeId) -> (Vector3, Matrix3) {
    burgers_and_frank_over(mesh, graph, ring_edges(mesh, first).collect::<Vec<_>>())
}

/// Tests whether a candidate ring (not yet linked into the mesh) is a genuine dislocation
/// circuit: its physical displacement closes, its accumulated lattice vector is non-zero (a
/// closed loop through only perfect lattice would give zero), and its Frank rotation is the
/// identity (otherwise the ring encircles a disclination, not a dislocation).
#[must_use]
pub(super) fn is_valid_dislocation_ring(mesh: &InterfaceMesh, graph: &ClusterGraph, edges: &[HalfEdgeId]) -> bool {
    let physical_sum: Vector3 = edges.iter().map(|&e| *mesh.half_edge(e).physical_vector()).sum();
    if physical_sum.norm() > crate::parameters::ATOM_VECTOR_EPSILON * 10.0 {
        return false;
    }
    let (burgers, frank) = burgers_and_frank_over(mesh, graph, edges.iter().copied());
    burgers.norm() > LATTICE_VECTOR_EPSILON && frank_rotation_is_identity(&frank)
}

/// Tests whether `a` and `b`, taken as a single Burgers-closure step and its reverse, are
/// consistent with a disclination-free region: Frank rotation around the union must be identity.
#[must_use]
pub(super) fn frank_rotation_is_identity(frank: &Matrix3) -> bool {
    crate::geometry::matrix_is_identity(frank, TRANSITION_MATRIX_EPSILON)
}

/// Returns `true` if none of the ring's edges already belong to a (different) live circuit.
#[must_use]
pub(super) fn ring_is_unclaimed(mesh: &InterfaceMesh, edges: &[HalfEdgeId]) -> bool {
    edges.iter().all(|&e| mesh.half_edge(e).circuit().is_none())
}

/// Builds the ring tracing the inner wall of the region the forward circuit sweeps: for each
/// forward edge, its opposite's next-face-edge steps one face further inward, giving a second
/// ring enclosing the same dislocation from the opposite node's side.
///
/// Returns `None` if any forward edge is a mesh boundary (no opposite), since there is then
/// nothing to enclose on that side.
#[must_use]
pub(super) fn build_reverse_ring(mesh: &InterfaceMesh, forward: &[HalfEdgeId]) -> Option<Vec<HalfEdgeId>> {
    forward.iter().map(|&e| mesh.half_edge(e).opposite().map(|opp| mesh.half_edge(opp).next_face_edge())).collect()
}
