//! Advances a circuit along the defect by a sequence of local half-edge moves (§4.5.5).
//!
//! Each call snapshots the circuit's ring from the mesh's linked `next_circuit_edge` pointers
//! into a plain `Vec` for the duration of one trace, applies moves to that vector, then relinks
//! it back into the mesh. The ring is still mesh-resident and mesh-linked between calls, as the
//! data model requires; only the scratch space for one advancement pass is a vector.

use rand::Rng;
use rand_mt::Mt;

use crate::cluster_graph::ClusterGraph;
use crate::interface_mesh::{CircuitId, HalfEdgeId, InterfaceMesh};

use super::circuit::{count_ring_edges, link_ring, ring_edges, unlink_ring};
use super::{DislocationNetwork, NodeId};

/// Advances every dangling node's circuit by one full trace pass at `circuit_length`.
pub(super) fn advance_all_dangling(mesh: &mut InterfaceMesh, graph: &ClusterGraph, network: &mut DislocationNetwork, circuit_length: usize, rng: &mut Mt) {
    let dangling: Vec<NodeId> = network
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.circuit.is_some())
        .map(|(i, _)| NodeId(i))
        .collect();
    for node in dangling {
        trace_segment(mesh, graph, network, node, circuit_length, rng);
    }
}

/// Runs the circuit attached to `node` through moves until it reaches `max_circuit_length` edges
/// or no move applies, appending one line point per successful move.
pub(super) fn trace_segment(mesh: &mut InterfaceMesh, graph: &ClusterGraph, network: &mut DislocationNetwork, node: NodeId, max_circuit_length: usize, rng: &mut Mt) {
    let Some(circuit_id) = network.nodes[node.0].circuit else { return };
    let is_primary = network.circuit(circuit_id).is_primary();
    let first_edge = network.circuit(circuit_id).first_edge();
    let mut ring: Vec<HalfEdgeId> = ring_edges(mesh, first_edge).collect();
    unlink_ring(mesh, first_edge);

    'outer: loop {
        if ring.is_empty() || ring.len() >= max_circuit_length {
            break;
        }

        let mut shortened_this_round = false;

        loop {
            let start = if ring.len() > 1 { rng.gen_range(0..ring.len()) } else { 0 };
            let mut acted = false;
            for offset in 0..ring.len() {
                let i = (start + offset) % ring.len();
                if try_remove_bight(mesh, &mut ring, i)
                    || try_consume_face(mesh, &mut ring, i, circuit_id, is_primary)
                    || try_replace_with_inner(mesh, &mut ring, i, circuit_id)
                    || try_sweep_two_facets(mesh, &mut ring, i, circuit_id)
                {
                    acted = true;
                    shortened_this_round = true;
                    break;
                }
            }
            if !acted {
                break;
            }
            if ring.is_empty() {
                break 'outer;
            }
            append_line_point(mesh, network, node, &ring);
        }

        if !shortened_this_round {
            let extended = (0..ring.len()).find(|&i| try_extend(mesh, &mut ring, i));
            match extended {
                Some(_) => append_line_point(mesh, network, node, &ring),
                None => break,
            }
        }
    }

    if ring.is_empty() {
        network.nodes[node.0].circuit = None;
        network.circuit_mut(circuit_id).edge_count = 0;
    } else {
        link_ring(mesh, &ring, circuit_id);
        let circuit = network.circuit_mut(circuit_id);
        circuit.first_edge = ring[0];
        circuit.edge_count = ring.len();
        debug_assert_eq!(ring.len(), count_ring_edges(mesh, ring[0]));
    }
}

fn append_line_point(mesh: &InterfaceMesh, network: &mut DislocationNetwork, node: NodeId, ring: &[HalfEdgeId]) {
    let segment_id = network.nodes[node.0].segment;
    let is_forward = network.segments[segment_id.0].forward == node;
    let start_vertex = mesh.half_edge(ring[0]).tail();
    let mut point = *mesh.vertex(start_vertex).position();
    let mut cumulative = crate::geometry::Vector3::zeros();
    for &e in ring {
        cumulative += mesh.half_edge(e).physical_vector();
    }
    point += cumulative / (ring.len().max(1) as f64);

    let segment = &mut network.segments[segment_id.0];
    if is_forward {
        segment.line.push_back(point);
        segment.core_size.push_back(ring.len());
    } else {
        segment.line.push_front(point);
        segment.core_size.push_front(ring.len());
    }
}

fn remove_at(ring: &mut Vec<HalfEdgeId>, indices: &[usize]) {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    for &i in sorted.iter().rev() {
        ring.remove(i);
    }
}

/// Move 1: two consecutive ring edges are mutual opposites -- a dead-end spike, spliced out.
fn try_remove_bight(mesh: &InterfaceMesh, ring: &mut Vec<HalfEdgeId>, i: usize) -> bool {
    if ring.len() < 2 {
        return false;
    }
    let j = (i + 1) % ring.len();
    if mesh.half_edge(ring[i]).opposite() == Some(ring[j]) {
        remove_at(ring, &[i, j]);
        true
    } else {
        false
    }
}

/// Move 2: three consecutive ring edges are exactly one unswept face's three edges. Only a
/// primary circuit flags the face it consumes here, so the defect mesh keeps it even once the
/// circuit stops dangling.
fn try_consume_face(mesh: &mut InterfaceMesh, ring: &mut Vec<HalfEdgeId>, i: usize, circuit_id: CircuitId, is_primary: bool) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let n = ring.len();
    let (a, b, c) = (ring[i], ring[(i + 1) % n], ring[(i + 2) % n]);
    let face = mesh.half_edge(a).face();
    if mesh.face(face).swept_by().is_some() {
        return false;
    }
    let face_edges = *mesh.face(face).edges();
    let matches = face_edges.contains(&a) && face_edges.contains(&b) && face_edges.contains(&c);
    if !matches {
        return false;
    }
    mesh.mark_swept(face, circuit_id, is_primary);
    remove_at(ring, &[i, (i + 1) % n, (i + 2) % n]);
    true
}

/// Move 3: two consecutive ring edges share one unswept face; replace both with that face's
/// third (inner) edge's opposite.
fn try_replace_with_inner(mesh: &mut InterfaceMesh, ring: &mut Vec<HalfEdgeId>, i: usize, circuit_id: CircuitId) -> bool {
    if ring.len() < 2 {
        return false;
    }
    let n = ring.len();
    let j = (i + 1) % n;
    let (a, b) = (ring[i], ring[j]);
    let face_a = mesh.half_edge(a).face();
    if mesh.half_edge(b).face() != face_a || mesh.face(face_a).swept_by().is_some() {
        return false;
    }
    let face_edges = *mesh.face(face_a).edges();
    let Some(&inner) = face_edges.iter().find(|&&e| e != a && e != b) else { return false };
    let Some(replacement) = mesh.half_edge(inner).opposite() else { return false };

    mesh.mark_swept(face_a, circuit_id, false);
    ring[i] = replacement;
    ring.remove(j);
    true
}

/// Move 4: two consecutive ring edges border two distinct unswept faces that share an inner
/// edge; replace both circuit edges with those faces' outer edges.
fn try_sweep_two_facets(mesh: &mut InterfaceMesh, ring: &mut Vec<HalfEdgeId>, i: usize, circuit_id: CircuitId) -> bool {
    if ring.len() < 2 {
        return false;
    }
    let n = ring.len();
    let j = (i + 1) % n;
    let (a, b) = (ring[i], ring[j]);
    let face_a = mesh.half_edge(a).face();
    let face_b = mesh.half_edge(b).face();
    if face_a == face_b || mesh.face(face_a).swept_by().is_some() || mesh.face(face_b).swept_by().is_some() {
        return false;
    }

    let edges_a = *mesh.face(face_a).edges();
    let edges_b = *mesh.face(face_b).edges();
    let shared = edges_a.iter().find_map(|&ea| {
        let opp = mesh.half_edge(ea).opposite()?;
        edges_b.contains(&opp).then_some((ea, opp))
    });
    let Some((inner_a, inner_b)) = shared else { return false };
    if inner_a == a || inner_b == b {
        return false;
    }

    let Some(&outer_a) = edges_a.iter().find(|&&e| e != a && e != inner_a) else { return false };
    let Some(&outer_b) = edges_b.iter().find(|&&e| e != b && e != inner_b) else { return false };

    mesh.mark_swept(face_a, circuit_id, false);
    mesh.mark_swept(face_b, circuit_id, false);
    ring[i] = outer_a;
    ring[j] = outer_b;
    true
}

/// Move 5: a ring edge's opposite face has two other, still-unowned edges; extend the circuit
/// onto them.
fn try_extend(mesh: &InterfaceMesh, ring: &mut Vec<HalfEdgeId>, i: usize) -> bool {
    let e = ring[i];
    let Some(opp) = mesh.half_edge(e).opposite() else { return false };
    let free_face = mesh.half_edge(opp).face();
    let edges = *mesh.face(free_face).edges();
    let others: Vec<HalfEdgeId> = edges.into_iter().filter(|&x| x != opp).collect();
    if others.len() != 2 {
        return false;
    }
    if others.iter().any(|&x| mesh.half_edge(x).circuit().is_some()) {
        return false;
    }
    // Order the two replacement edges so they walk tail-to-head through the face, matching `e`'s
    // direction (the face cycle determines which of `others` continues from `e`'s head).
    let (first, second) = if mesh.half_edge(others[0]).tail() == mesh.half_edge(e).head() {
        (others[0], others[1])
    } else {
        (others[1], others[0])
    };
    ring[i] = first;
    ring.insert(i + 1, second);
    true
}
