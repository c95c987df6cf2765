//! Constructs an [`InterfaceMesh`] from the primary good cells of a tessellation.

use std::collections::{HashMap, HashSet};

use super::classify::{classify_tetrahedra, TetrahedronClassification};
use super::validate::validate_mesh;
use super::{FaceId, HalfEdgeId, InterfaceFace, InterfaceHalfEdge, InterfaceMesh, InterfaceVertex, VertexId};

use crate::cluster_graph::ClusterGraph;
use crate::elastic_mapping::ElasticMapping;
use crate::geometry::{SimulationCell, Vector3};
use crate::tessellation::{Tessellation, TET_FACES};

/// Builds the interface mesh: every face of a primary good cell that borders a non-good (bad or
/// out-of-range) neighbor becomes a mesh face, with non-manifold vertices split into one vertex
/// per fan.
#[must_use]
pub fn create_mesh(
    tess: &impl Tessellation,
    mapping: &ElasticMapping,
    graph: &ClusterGraph,
    positions: &[Vector3],
    cell: &SimulationCell,
    classification: &TetrahedronClassification,
) -> InterfaceMesh {
    let mut mesh = InterfaceMesh::default();
    let mut vertex_of_atom: HashMap<usize, VertexId> = HashMap::new();
    let mut pending_opposite: HashMap<(usize, usize), Vec<(usize, usize, HalfEdgeId)>> = HashMap::new();

    let cell_count = tess.cell_count();
    for i in 0..cell_count {
        if classification.mesh_index(i).is_none() {
            continue;
        }
        let tet = tess.cell(i);
        for (face_idx, face_verts) in TET_FACES.iter().enumerate() {
            let mirror = tess.mirror_facet(i, face_idx);
            let mirror_is_good = mirror < cell_count && classification.is_good(mirror);
            if mirror_is_good {
                continue;
            }
            let atoms = [tet.vertices[face_verts[0]], tet.vertices[face_verts[1]], tet.vertices[face_verts[2]]];
            emit_face(tess, &mut mesh, &mut vertex_of_atom, &mut pending_opposite, mapping, graph, positions, cell, atoms, i, face_idx);
        }
    }

    separate_vertex_fans(&mut mesh);

    #[cfg(debug_assertions)]
    validate_mesh(&mesh);

    mesh
}

fn vertex_for_atom(mesh: &mut InterfaceMesh, vertex_of_atom: &mut HashMap<usize, VertexId>, positions: &[Vector3], atom: usize) -> VertexId {
    *vertex_of_atom.entry(atom).or_insert_with(|| {
        let id = VertexId(mesh.vertices.len());
        mesh.vertices.push(InterfaceVertex {
            position: positions[atom],
            atom_index: atom,
            outgoing: Vec::new(),
        });
        id
    })
}

#[allow(clippy::too_many_arguments)]
fn emit_face(
    tess: &impl Tessellation,
    mesh: &mut InterfaceMesh,
    vertex_of_atom: &mut HashMap<usize, VertexId>,
    pending_opposite: &mut HashMap<(usize, usize), Vec<(usize, usize, HalfEdgeId)>>,
    mapping: &ElasticMapping,
    graph: &ClusterGraph,
    positions: &[Vector3],
    cell: &SimulationCell,
    atoms: [usize; 3],
    cell_index: usize,
    face_index: usize,
) {
    let verts = [
        vertex_for_atom(mesh, vertex_of_atom, positions, atoms[0]),
        vertex_for_atom(mesh, vertex_of_atom, positions, atoms[1]),
        vertex_for_atom(mesh, vertex_of_atom, positions, atoms[2]),
    ];

    let face_id = FaceId(mesh.faces.len());
    let base = HalfEdgeId(mesh.half_edges.len());
    let edge_ids = [base, HalfEdgeId(base.0 + 1), HalfEdgeId(base.0 + 2)];

    for k in 0..3 {
        let tail_atom = atoms[k];
        let head_atom = atoms[(k + 1) % 3];
        let tail_vertex = verts[k];
        let head_vertex = verts[(k + 1) % 3];

        let physical_vector = cell.wrap_vector(&(positions[head_atom] - positions[tail_atom]));
        let (cluster_vector, cluster_transition) = mapping
            .get_edge_cluster_vector(graph, tail_atom, head_atom)
            .expect("every interface-mesh edge must come from an assigned elastic-mapping edge");

        mesh.half_edges.push(InterfaceHalfEdge {
            tail: tail_vertex,
            head: head_vertex,
            opposite: None,
            next_face_edge: edge_ids[(k + 1) % 3],
            face: face_id,
            physical_vector,
            cluster_vector,
            cluster_transition,
            circuit: None,
            next_circuit_edge: None,
        });

        mesh.vertices[tail_vertex.0].outgoing.push(edge_ids[k]);

        match resolve_opposite(tess, pending_opposite, tail_atom, head_atom, cell_index, face_index) {
            Some(opp) => {
                mesh.half_edges[edge_ids[k].0].opposite = Some(opp);
                mesh.half_edges[opp.0].opposite = Some(edge_ids[k]);
            }
            None => {
                pending_opposite
                    .entry((tail_atom, head_atom))
                    .or_default()
                    .push((cell_index, face_index, edge_ids[k]));
            }
        }
    }

    mesh.faces.push(InterfaceFace {
        edges: edge_ids,
        swept_by: None,
        primary_flag: false,
    });
}

/// Finds and removes this edge's true geometric opposite among the faces already emitted with
/// the reversed atom pair, disambiguating a non-manifold edge (more than two triangular facets
/// sharing the same ordered atom-index pair, a real occurrence near dislocation cores) via
/// [`Tessellation::incident_facets`] rather than matching the first candidate an atom-index-keyed
/// lookup happens to find.
fn resolve_opposite(
    tess: &impl Tessellation,
    pending_opposite: &mut HashMap<(usize, usize), Vec<(usize, usize, HalfEdgeId)>>,
    tail_atom: usize,
    head_atom: usize,
    cell_index: usize,
    face_index: usize,
) -> Option<HalfEdgeId> {
    let candidates = pending_opposite.get_mut(&(head_atom, tail_atom))?;
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates.remove(0).2);
    }

    let ring = tess.incident_facets(tail_atom, head_atom, cell_index, face_index);
    let position = candidates
        .iter()
        .position(|&(c, f, _)| ring.iter().any(|&(rc, rf)| rc == c && rf == f))
        .unwrap_or(0);
    Some(candidates.remove(position).2)
}

/// Splits every vertex touched by more than one fan of faces into one vertex per fan, so the
/// resulting mesh is a genuine 2-manifold (the usual outcome for a vertex shared by dislocation
/// lines or by otherwise-disjoint sheets of bad material).
fn separate_vertex_fans(mesh: &mut InterfaceMesh) {
    let original_count = mesh.vertices.len();
    for v in 0..original_count {
        let fans = fans_at_vertex(mesh, VertexId(v));
        if fans.len() <= 1 {
            continue;
        }
        for fan in fans.into_iter().skip(1) {
            let new_vertex = VertexId(mesh.vertices.len());
            mesh.vertices.push(InterfaceVertex {
                position: mesh.vertices[v].position,
                atom_index: mesh.vertices[v].atom_index,
                outgoing: fan.clone(),
            });
            for &e in &fan {
                mesh.half_edges[e.0].tail = new_vertex;
                let arriving = mesh.prev_face_edge(e);
                mesh.half_edges[arriving.0].head = new_vertex;
            }
            mesh.vertices[v].outgoing.retain(|e| !fan.contains(e));
        }
    }
}

/// Groups the half-edges leaving `v` into connected fans, walking the vertex rotation
/// `rotate(e) = next_face_edge(opposite(e))` forward and `prev_face_edge(opposite(prev_face_edge(e)))`
/// backward, stopping at mesh boundaries in either direction.
fn fans_at_vertex(mesh: &InterfaceMesh, v: VertexId) -> Vec<Vec<HalfEdgeId>> {
    let outgoing = mesh.vertices[v.0].outgoing.clone();
    let mut visited = HashSet::new();
    let mut fans = Vec::new();

    for &start in &outgoing {
        if visited.contains(&start) {
            continue;
        }
        let mut fan = vec![start];
        visited.insert(start);

        let mut cur = start;
        while let Some(opp) = mesh.half_edge(cur).opposite {
            let next = mesh.half_edge(opp).next_face_edge;
            if next == start || visited.contains(&next) {
                break;
            }
            fan.push(next);
            visited.insert(next);
            cur = next;
        }

        let mut cur = start;
        loop {
            let prev = mesh.prev_face_edge(cur);
            let Some(opp) = mesh.half_edge(prev).opposite else { break };
            if opp == start || visited.contains(&opp) {
                break;
            }
            fan.push(opp);
            visited.insert(opp);
            cur = opp;
        }

        fans.push(fan);
    }

    fans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elastic_mapping::build_elastic_mapping;
    use crate::structure::{AtomStructureInput, CrystalStructure, NeighborBond, StructureAnalysisInput};
    use crate::tessellation::TetCell;

    /// Two tetrahedra glued on a shared face, all four outer faces "bad" (no further neighbor),
    /// the shared inner face "good" on both sides so it does not appear in the mesh.
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
            // Cell 0's face 0 (vertices 1,2,3) mirrors cell 1's face 3 (vertices 1,2,3), and
            // vice versa; every other face has no neighbor (mirrors to an out-of-range index).
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
            local_orientation: crate::geometry::Matrix3::identity(),
            neighbors,
        }
    }

    #[test]
    fn shared_good_face_between_two_good_tets_is_not_meshed() {
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
        let all_pairs: Vec<(usize, usize)> = vec![
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 2),
            (1, 3),
            (2, 3),
            (1, 4),
            (2, 4),
            (3, 4),
        ];
        let mut neighbors = vec![Vec::new(); 5];
        for &(a, b) in &all_pairs {
            neighbors[a].push(bond(a, b));
            neighbors[b].push(bond(b, a));
        }
        let atoms = neighbors.into_iter().map(atom).collect();
        let input = StructureAnalysisInput { atoms };

        let cell = SimulationCell::new(crate::geometry::Matrix3::identity() * 100.0, [false, false, false]).expect("valid cell");
        let seed_clusters = vec![c; 5];
        let tess = TwoTets;

        let mapping = build_elastic_mapping(&tess, &positions, &cell, &seed_clusters, &input, &mut graph).expect("no wrap violations");
        let classification = classify_tetrahedra(&tess, &mapping, &graph);
        assert!(classification.is_good(0));
        assert!(classification.is_good(1));

        let mesh = create_mesh(&tess, &mapping, &graph, &positions, &cell, &classification);
        // 4 exterior faces total (3 from each tet minus the shared pair), none of them the
        // good/good shared face.
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.half_edge_count(), 18);
    }
}
