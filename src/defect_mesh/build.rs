//! Constructs a [`DefectMesh`] from a traced [`InterfaceMesh`] and its [`DislocationNetwork`].

use std::collections::HashMap;

use super::validate::validate_mesh;
use super::{DefectFace, DefectHalfEdge, DefectMesh, DefectVertex, DefectVertexId};

use crate::dislocation::{DislocationNetwork, NodeId};
use crate::interface_mesh::{FaceId, InterfaceMesh, VertexId};

/// Builds the defect mesh: every interface mesh vertex carried over unchanged; every face not
/// permanently consumed by a non-dangling, non-primary circuit; one triangulated cap per dangling
/// circuit closing the hole its `segmentMeshCap` left behind.
#[must_use]
pub fn build_defect_mesh(mesh: &InterfaceMesh, network: &DislocationNetwork) -> DefectMesh {
    let mut defect = DefectMesh::default();
    let mut pending_opposite: HashMap<(usize, usize), super::DefectHalfEdgeId> = HashMap::new();

    for v in 0..mesh.vertex_count() {
        defect.vertices.push(DefectVertex {
            position: *mesh.vertex(VertexId(v)).position(),
        });
    }

    for i in 0..mesh.face_count() {
        let face_id = FaceId(i);
        if !keep_face(mesh, network, face_id) {
            continue;
        }
        let edges = *mesh.face(face_id).edges();
        let verts = edges.map(|e| {
            let he = mesh.half_edge(e);
            (he.tail().0, he.head().0)
        });
        emit_triangle(&mut defect, &mut pending_opposite, verts);
    }

    for i in 0..network.node_count() {
        let node = NodeId(i);
        let Some(circuit_id) = network.node(node).circuit() else { continue };
        let cap_vertex = DefectVertexId(defect.vertices.len());
        defect.vertices.push(DefectVertex {
            position: node_cap_position(network, node),
        });

        let cap_edges = network.circuit(circuit_id).mesh_cap().to_vec();
        for e in cap_edges {
            let he = mesh.half_edge(e);
            let (t, h) = (he.tail().0, he.head().0);
            emit_triangle(&mut defect, &mut pending_opposite, [(h, t), (t, cap_vertex.0), (cap_vertex.0, h)]);
        }
    }

    #[cfg(debug_assertions)]
    validate_mesh(&defect);

    defect
}

/// A face survives into the defect mesh unless some circuit swept it, that circuit has stopped
/// dangling, and the face was not flagged as consumed by a primary trace.
fn keep_face(mesh: &InterfaceMesh, network: &DislocationNetwork, face_id: FaceId) -> bool {
    let face = mesh.face(face_id);
    let Some(circuit_id) = face.swept_by() else { return true };
    network.circuit(circuit_id).is_dangling() || face.primary_flag()
}

/// The position of a still-dangling node: the line endpoint nearest that node.
fn node_cap_position(network: &DislocationNetwork, node: NodeId) -> crate::geometry::Vector3 {
    let segment_id = network.node(node).segment();
    let segment = &network.segments()[segment_id.0];
    if segment.forward() == node {
        *segment.line().back().expect("segment has at least one line point")
    } else {
        *segment.line().front().expect("segment has at least one line point")
    }
}

/// Pushes one triangular face with the three given `(tail, head)` vertex-index pairs (already in
/// cycle order), stitching each edge against a previously emitted edge sharing the same pair of
/// vertices in reverse.
fn emit_triangle(defect: &mut DefectMesh, pending_opposite: &mut HashMap<(usize, usize), super::DefectHalfEdgeId>, verts: [(usize, usize); 3]) {
    let face_id = super::DefectFaceId(defect.faces.len());
    let base = super::DefectHalfEdgeId(defect.half_edges.len());
    let edge_ids = [base, super::DefectHalfEdgeId(base.0 + 1), super::DefectHalfEdgeId(base.0 + 2)];

    for (k, &(tail_idx, head_idx)) in verts.iter().enumerate() {
        defect.half_edges.push(DefectHalfEdge {
            tail: DefectVertexId(tail_idx),
            head: DefectVertexId(head_idx),
            opposite: None,
            next_face_edge: edge_ids[(k + 1) % 3],
            face: face_id,
        });

        if let Some(opp) = pending_opposite.remove(&(head_idx, tail_idx)) {
            defect.half_edges[edge_ids[k].0].opposite = Some(opp);
            defect.half_edges[opp.0].opposite = Some(edge_ids[k]);
        } else {
            pending_opposite.insert((tail_idx, head_idx), edge_ids[k]);
        }
    }

    defect.faces.push(DefectFace { edges: edge_ids });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_graph::ClusterGraph;
    use crate::dislocation::trace_dislocation_segments;
    use crate::elastic_mapping::build_elastic_mapping;
    use crate::geometry::{Matrix3, SimulationCell, Vector3};
    use crate::interface_mesh::{classify_tetrahedra, create_mesh};
    use crate::parameters::Parameters;
    use crate::progress::NullProgress;
    use crate::structure::{AtomStructureInput, CrystalStructure, NeighborBond, StructureAnalysisInput};
    use crate::tessellation::{Tessellation, TetCell};

    struct TwoTets;

    impl Tessellation for TwoTets {
        fn cell_count(&self) -> usize {
            2
        }
        fn cell(&self, index: usize) -> TetCell {
            match index {
                0 => TetCell {
                    vertices: [0, 1, 2, 3],
                    is_ghost: false,
                },
                1 => TetCell {
                    vertices: [1, 2, 3, 4],
                    is_ghost: false,
                },
                _ => unreachable!(),
            }
        }
        fn mirror_facet(&self, cell: usize, face: usize) -> usize {
            match (cell, face) {
                (0, 0) => 1,
                (1, 3) => 0,
                _ => usize::MAX,
            }
        }
        fn cell_facet_vertex_index(&self, _face: usize, vertex_in_face: usize) -> usize {
            vertex_in_face
        }
        fn incident_facets(&self, _v1: usize, _v2: usize, start_cell: usize, start_face: usize) -> Vec<(usize, usize)> {
            vec![(start_cell, start_face)]
        }
    }

    fn atom(neighbors: Vec<NeighborBond>) -> AtomStructureInput {
        AtomStructureInput {
            structure: CrystalStructure::Fcc,
            local_orientation: Matrix3::identity(),
            neighbors,
        }
    }

    /// A no-dislocation configuration's defect mesh must be a perfectly closed, boundary-free
    /// 2-manifold: every interior face gets emitted, every edge finds its opposite, no caps.
    #[test]
    fn no_dislocation_mesh_is_closed() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let mut graph = ClusterGraph::new();
        let c = graph.create_cluster(CrystalStructure::Fcc);

        let bond = |i: usize, j: usize| NeighborBond {
            neighbor: j,
            lattice_vector: positions[j] - positions[i],
        };
        let all_pairs = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3), (1, 4), (2, 4), (3, 4)];
        let mut neighbors = vec![Vec::new(); 5];
        for &(a, b) in &all_pairs {
            neighbors[a].push(bond(a, b));
            neighbors[b].push(bond(b, a));
        }
        let atoms = neighbors.into_iter().map(atom).collect();
        let input = StructureAnalysisInput { atoms };

        let cell = SimulationCell::new(Matrix3::identity() * 100.0, [false, false, false]).expect("valid cell");
        let seed_clusters = vec![c; 5];
        let tess = TwoTets;

        let mapping = build_elastic_mapping(&tess, &positions, &cell, &seed_clusters, &input, &mut graph).expect("no wrap violations");
        let classification = classify_tetrahedra(&tess, &mapping, &graph);
        let mut mesh = create_mesh(&tess, &mapping, &graph, &positions, &cell, &classification);

        let parameters = Parameters::default();
        let network = trace_dislocation_segments(&mut mesh, &graph, &mapping, &parameters, &mut NullProgress).expect("no cancellation");
        assert!(network.segments().is_empty());

        let defect = build_defect_mesh(&mesh, &network);
        assert_eq!(defect.face_count(), mesh.face_count());
        assert!(defect.is_closed());
        for face in &defect.faces {
            for &e in &face.edges {
                let first = defect.half_edge(e).next_face_edge();
                let second = defect.half_edge(first).next_face_edge();
                let third = defect.half_edge(second).next_face_edge();
                assert_eq!(third, e, "every face must be a 3-cycle");
            }
        }
    }
}
