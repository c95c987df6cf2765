//! Assigns every tessellation edge an ideal lattice vector and a cluster transition.

mod path_finder;

pub use path_finder::find_path;

use crate::cluster_graph::{ClusterGraph, ClusterId, TransitionId};
use crate::error::{DxaError, DxaResult};
use crate::geometry::{matrix_is_identity, ClusterVector, SimulationCell, TRANSITION_MATRIX_EPSILON};
use crate::structure::StructureAnalysisInput;
use crate::tessellation::{Tessellation, TET_EDGES, TET_FACES};

/// A stable index into an [`ElasticMapping`]'s edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) usize);

/// One (directed) edge of the tetrahedralization, carrying its ideal lattice vector once assigned.
#[derive(Debug, Clone)]
pub struct TessellationEdge {
    pub(crate) v1: usize,
    pub(crate) v2: usize,
    /// The ideal lattice vector from `v1` to `v2`, in `v1`'s cluster frame, once assigned.
    pub(crate) vector: Option<ClusterVector>,
    /// The `v1 -> v2` cluster transition, once assigned. Set iff `vector` is.
    pub(crate) transition: Option<TransitionId>,
    next_leaving: Option<EdgeId>,
    next_arriving: Option<EdgeId>,
}

impl TessellationEdge {
    /// The source vertex (atom index).
    #[must_use]
    pub const fn v1(&self) -> usize {
        self.v1
    }

    /// The destination vertex (atom index).
    #[must_use]
    pub const fn v2(&self) -> usize {
        self.v2
    }

    /// The ideal lattice vector from `v1` to `v2`, if assigned.
    #[must_use]
    pub const fn vector(&self) -> Option<&ClusterVector> {
        self.vector.as_ref()
    }

    /// The `v1 -> v2` cluster transition, if assigned.
    #[must_use]
    pub const fn transition(&self) -> Option<TransitionId> {
        self.transition
    }
}

/// Owns the deduplicated tessellation-edge arena and the per-vertex cluster assignment it was
/// built against.
#[derive(Debug, Clone, Default)]
pub struct ElasticMapping {
    edges: Vec<TessellationEdge>,
    leaving: Vec<Option<EdgeId>>,
    arriving: Vec<Option<EdgeId>>,
    vertex_clusters: Vec<ClusterId>,
}

impl ElasticMapping {
    /// The per-vertex cluster assignment used to build this mapping (after relaxation).
    #[must_use]
    pub fn vertex_clusters(&self) -> &[ClusterId] {
        &self.vertex_clusters
    }

    /// Looks up an edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &TessellationEdge {
        &self.edges[id.0]
    }

    /// The number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates the ids of the edges leaving `vertex`.
    fn leaving_ids(&self, vertex: usize) -> impl Iterator<Item = EdgeId> + '_ {
        let mut next = self.leaving.get(vertex).copied().flatten();
        std::iter::from_fn(move || {
            let id = next?;
            next = self.edges[id.0].next_leaving;
            Some(id)
        })
    }

    /// Iterates the ids of the edges arriving at `vertex`.
    fn arriving_ids(&self, vertex: usize) -> impl Iterator<Item = EdgeId> + '_ {
        let mut next = self.arriving.get(vertex).copied().flatten();
        std::iter::from_fn(move || {
            let id = next?;
            next = self.edges[id.0].next_arriving;
            Some(id)
        })
    }

    /// Iterates the edges leaving `vertex`.
    pub fn leaving_edges(&self, vertex: usize) -> impl Iterator<Item = &TessellationEdge> + '_ {
        self.leaving_ids(vertex).map(move |id| &self.edges[id.0])
    }

    /// Iterates the edges arriving at `vertex`.
    pub fn arriving_edges(&self, vertex: usize) -> impl Iterator<Item = &TessellationEdge> + '_ {
        self.arriving_ids(vertex).map(move |id| &self.edges[id.0])
    }

    /// Finds the edge `v1 -> v2` if it has already been registered (in either direction).
    fn find_edge(&self, v1: usize, v2: usize) -> Option<(EdgeId, bool)> {
        self.leaving_ids(v1)
            .find(|&id| self.edges[id.0].v2 == v2)
            .map(|id| (id, false))
            .or_else(|| self.arriving_ids(v1).find(|&id| self.edges[id.0].v1 == v2).map(|id| (id, true)))
    }

    /// Returns the ideal lattice vector between `v1` and `v2` in `v1`'s frame, if both the edge
    /// and the cluster transition across it have been assigned. Used by `InterfaceMesh` to carry
    /// ideal/transition data onto mesh half-edges.
    ///
    /// Edges are deduplicated and may have been registered in either direction; when only the
    /// `v2 -> v1` direction is stored, this reconstructs `v1 -> v2` via the opposite-edge
    /// anti-symmetry invariant (`e.vec + e.transition.reverse() * opposite.vec ~= 0`).
    #[must_use]
    pub fn get_edge_cluster_vector(&self, graph: &ClusterGraph, v1: usize, v2: usize) -> Option<(ClusterVector, TransitionId)> {
        match self.find_edge(v1, v2)? {
            (id, false) => {
                let e = &self.edges[id.0];
                Some((e.vector?, e.transition?))
            }
            (id, true) => {
                let e = &self.edges[id.0];
                let t_v2_to_v1 = e.transition?;
                let stored_vec = e.vector?;
                let v1_cluster = self.vertex_clusters.get(v1).copied()?;
                let tm = *graph.transition(t_v2_to_v1).tm();
                let new_vec = -(tm * stored_vec.local_vec());
                let t_v1_to_v2 = graph.transition(t_v2_to_v1).reverse();
                Some((ClusterVector::new(new_vec, v1_cluster), t_v1_to_v2))
            }
        }
    }
}

/// Builds the deduplicated edge list for every primary tetrahedron in `tess`, assigns each vertex
/// a cluster by relaxation from `seed_clusters`, and fills in ideal vectors and transitions.
///
/// # Errors
///
/// [`DxaError::SimulationCellTooSmall`] if any tessellation edge spans more than half a periodic
/// image -- the cell is too small for the chosen cutoffs.
pub fn build_elastic_mapping(
    tess: &impl Tessellation,
    positions: &[crate::geometry::Vector3],
    cell: &SimulationCell,
    seed_clusters: &[ClusterId],
    input: &StructureAnalysisInput,
    graph: &mut ClusterGraph,
) -> DxaResult<ElasticMapping> {
    let n_vertices = positions.len();
    let mut mapping = ElasticMapping {
        edges: Vec::new(),
        leaving: vec![None; n_vertices],
        arriving: vec![None; n_vertices],
        vertex_clusters: seed_clusters.to_vec(),
    };

    for cell_idx in 0..tess.cell_count() {
        let tet = tess.cell(cell_idx);
        if tet.is_ghost {
            continue;
        }
        for &(a, b) in &TET_EDGES {
            let (v1, v2) = (tet.vertices[a], tet.vertices[b]);
            if v1 == v2 {
                continue;
            }
            let displacement = positions[v2] - positions[v1];
            cell.check_not_wrapped(&displacement).map_err(|axis| DxaError::SimulationCellTooSmall { axis })?;
            register_edge(&mut mapping, v1, v2);
        }
    }

    relax_vertex_clusters(&mut mapping);
    assign_ideal_vectors(&mut mapping, input, graph);

    Ok(mapping)
}

fn register_edge(mapping: &mut ElasticMapping, v1: usize, v2: usize) {
    if mapping.find_edge(v1, v2).is_some() || mapping.find_edge(v2, v1).is_some() {
        return;
    }
    let id = EdgeId(mapping.edges.len());
    mapping.edges.push(TessellationEdge {
        v1,
        v2,
        vector: None,
        transition: None,
        next_leaving: mapping.leaving[v1],
        next_arriving: mapping.arriving[v2],
    });
    mapping.leaving[v1] = Some(id);
    mapping.arriving[v2] = Some(id);
}

/// Propagates cluster membership from assigned vertices to their neighbors (through both leaving
/// and arriving edges) until fixpoint. Terminates because every step strictly reduces the
/// unassigned count.
fn relax_vertex_clusters(mapping: &mut ElasticMapping) {
    loop {
        let mut changed = false;
        for v in 0..mapping.vertex_clusters.len() {
            if !mapping.vertex_clusters[v].is_null() {
                continue;
            }
            let from_leaving = mapping.leaving_edges(v).map(|e| mapping.vertex_clusters[e.v2]).find(|c| !c.is_null());
            let from_arriving = mapping.arriving_edges(v).map(|e| mapping.vertex_clusters[e.v1]).find(|c| !c.is_null());
            if let Some(c) = from_leaving.or(from_arriving) {
                mapping.vertex_clusters[v] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn assign_ideal_vectors(mapping: &mut ElasticMapping, input: &StructureAnalysisInput, graph: &mut ClusterGraph) {
    for i in 0..mapping.edges.len() {
        let (v1, v2) = (mapping.edges[i].v1, mapping.edges[i].v2);
        let (c1, c2) = (mapping.vertex_clusters[v1], mapping.vertex_clusters[v2]);
        if c1.is_null() || c2.is_null() {
            continue;
        }

        let Some(path_vec) = path_finder::find_path(v1, v2, &mapping.vertex_clusters, input, graph, 2) else {
            continue;
        };

        let in_v1_frame = if path_vec.frame() == Some(c1) {
            Some(path_vec)
        } else if let Some(path_frame) = path_vec.frame() {
            graph.determine_cluster_transition(path_frame, c1).map(|t| path_vec.transformed(graph.transition(t).tm(), c1))
        } else {
            Some(ClusterVector::new(crate::geometry::Vector3::zeros(), c1))
        };

        let Some(vector) = in_v1_frame else { continue };
        let Some(transition) = graph.determine_cluster_transition(c1, c2) else { continue };

        mapping.edges[i].vector = Some(vector);
        mapping.edges[i].transition = Some(transition);
    }
}

/// Tests whether every face of `tet`'s six edges' `(b, T)` pairs satisfies both the Burgers
/// closure and the Frank-rotation identity. Returns `false` (the cell is "bad") at the first
/// violated face or the first edge without an assigned vector.
#[must_use]
pub fn is_elastic_mapping_compatible(mapping: &ElasticMapping, graph: &ClusterGraph, tet: &crate::tessellation::TetCell) -> bool {
    // Gather (b, T) for each of the six edges, indexed as in `TET_EDGES`.
    let mut edge_data = [None; 6];
    for (slot, &(a, b)) in TET_EDGES.iter().enumerate() {
        let (v1, v2) = (tet.vertices[a], tet.vertices[b]);
        let Some((vector, transition)) = mapping.get_edge_cluster_vector(graph, v1, v2) else {
            return false;
        };
        edge_data[slot] = Some((vector, transition));
    }

    for face in &TET_FACES {
        // The three oriented edges walking around this face, as indices into `TET_EDGES`/`edge_data`.
        let walk = face_edge_walk(face).expect("TET_FACES entries must trace valid TET_EDGES pairs");
        let mut burgers = crate::geometry::Vector3::zeros();
        let mut frank = crate::geometry::Matrix3::identity();
        let mut first = true;
        for &(slot, forward) in &walk {
            let Some((vector, transition)) = edge_data[slot] else { return false };
            let tm = *graph.transition(transition).tm();
            let (step, step_tm) = if forward {
                (*vector.local_vec(), tm)
            } else {
                let inv = tm.try_inverse().unwrap_or_else(crate::geometry::Matrix3::identity);
                (-(inv * vector.local_vec()), inv)
            };
            if first {
                burgers = step;
                frank = step_tm;
                first = false;
            } else {
                burgers += step;
                frank = step_tm * frank;
            }
        }
        if burgers.norm() > crate::geometry::LATTICE_VECTOR_EPSILON {
            return false;
        }
        if !matrix_is_identity(&frank, TRANSITION_MATRIX_EPSILON) {
            return false;
        }
    }

    true
}

/// Builds the `(edge_slot, forward)` walk around a tetrahedron face given the three vertex
/// indices it touches, matching slots against [`TET_EDGES`].
fn face_edge_walk(face: &[usize; 3]) -> Option<[(usize, bool); 3]> {
    let pairs = [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])];
    let mut out = [(0usize, true); 3];
    for (i, &(a, b)) in pairs.iter().enumerate() {
        let (slot, forward) = TET_EDGES
            .iter()
            .enumerate()
            .find_map(|(slot, &(x, y))| {
                if (x, y) == (a, b) {
                    Some((slot, true))
                } else if (x, y) == (b, a) {
                    Some((slot, false))
                } else {
                    None
                }
            })?;
        out[i] = (slot, forward);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector3;
    use crate::structure::{AtomStructureInput, CrystalStructure, NeighborBond};
    use crate::tessellation::TetCell;

    /// A single tetrahedron, no ghosts.
    struct OneTet {
        verts: [usize; 4],
    }

    impl Tessellation for OneTet {
        fn cell_count(&self) -> usize {
            1
        }
        fn cell(&self, _index: usize) -> TetCell {
            TetCell {
                vertices: self.verts,
                is_ghost: false,
            }
        }
        fn mirror_facet(&self, _cell: usize, _face: usize) -> usize {
            usize::MAX
        }
        fn cell_facet_vertex_index(&self, _face: usize, vertex_in_face: usize) -> usize {
            vertex_in_face
        }
        fn incident_facets(&self, _v1: usize, _v2: usize, start_cell: usize, start_face: usize) -> Vec<(usize, usize)> {
            vec![(start_cell, start_face)]
        }
    }

    fn bond(neighbor: usize, v: Vector3) -> NeighborBond {
        NeighborBond {
            neighbor,
            lattice_vector: v,
        }
    }

    #[test]
    fn single_cluster_tetrahedron_is_elastically_compatible() {
        // Four points of a regular-ish tetrahedron, all in the same cluster, with bonds that
        // close exactly (zero Burgers vector, identity Frank rotation on every face).
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let mut graph = ClusterGraph::new();
        let c = graph.create_cluster(CrystalStructure::Fcc);
        let frame = crate::geometry::Matrix3::identity();

        let neighbor_vec = |i: usize, j: usize| positions[j] - positions[i];
        let atoms = (0..4)
            .map(|i| AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: frame,
                neighbors: (0..4)
                    .filter(|&j| j != i)
                    .map(|j| bond(j, neighbor_vec(i, j)))
                    .collect(),
            })
            .collect();
        let input = StructureAnalysisInput { atoms };

        let cell = SimulationCell::new(crate::geometry::Matrix3::identity() * 100.0, [false, false, false]).expect("valid cell");
        let seed_clusters = vec![c; 4];
        let tess = OneTet { verts: [0, 1, 2, 3] };

        let mapping = build_elastic_mapping(&tess, &positions, &cell, &seed_clusters, &input, &mut graph).expect("no wrap violations");

        assert_eq!(mapping.edge_count(), 6);
        let tet = tess.cell(0);
        assert!(is_elastic_mapping_compatible(&mapping, &graph, &tet));
    }
}
