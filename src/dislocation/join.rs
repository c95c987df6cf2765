//! Secondary segment discovery, blockage detection, and junction materialization (§4.5.6), plus
//! the mesh-cap snapshot taken once tracing is about to stop (§4.5.7 step 4).

use crate::cluster_graph::ClusterGraph;
use crate::geometry::Vector3;
use crate::interface_mesh::{HalfEdgeId, InterfaceMesh};

use super::circuit::{is_valid_dislocation_ring, ring_edges, ring_is_unclaimed};
use super::{DislocationNetwork, NodeId};

/// Runs one round of junction formation at `circuit_length`: fills gaps around dangling circuits
/// with secondary segments, flags fully blocked circuits and links their dangling nodes into
/// junction rings, then materializes any ring that stayed fully blocked into a closed loop, a
/// merged segment, or a real junction.
pub(super) fn join_segments(mesh: &mut InterfaceMesh, graph: &ClusterGraph, network: &mut DislocationNetwork, circuit_length: usize, rng: &mut rand_mt::Mt) {
    fill_gaps(mesh, graph, network, circuit_length, rng);
    link_blocked_neighbors(mesh, network);
    materialize_rings(network);
}

/// Pass A: for each dangling circuit, finds maximal runs of ring edges whose opposite is not
/// already claimed by any circuit, and tries to grow a secondary segment along the inner wall of
/// each such gap.
fn fill_gaps(mesh: &mut InterfaceMesh, graph: &ClusterGraph, network: &mut DislocationNetwork, circuit_length: usize, rng: &mut rand_mt::Mt) {
    let dangling: Vec<_> = network.nodes.iter().filter_map(|n| n.circuit).collect();
    for circuit_id in dangling {
        let first = network.circuit(circuit_id).first_edge();
        let ring: Vec<HalfEdgeId> = ring_edges(mesh, first).collect();
        for gap in gaps(mesh, &ring) {
            let candidate: Option<Vec<HalfEdgeId>> = gap
                .iter()
                .map(|&e| mesh.half_edge(e).opposite().map(|opp| mesh.half_edge(opp).next_face_edge()))
                .collect();
            let Some(candidate) = candidate else { continue };
            if ring_is_unclaimed(mesh, &candidate) && is_valid_dislocation_ring(mesh, graph, &candidate) {
                super::search::create_and_trace(mesh, graph, network, &candidate, circuit_length, false, rng);
            }
        }
    }
}

/// Splits `ring`'s edges into maximal runs whose opposite edge belongs to no circuit.
fn gaps(mesh: &InterfaceMesh, ring: &[HalfEdgeId]) -> Vec<Vec<HalfEdgeId>> {
    let is_gap_edge = |e: &HalfEdgeId| match mesh.half_edge(*e).opposite() {
        Some(opp) => mesh.half_edge(opp).circuit().is_none(),
        None => true,
    };
    let n = ring.len();
    let mut runs = Vec::new();
    let mut i = 0;
    while i < n {
        if !is_gap_edge(&ring[i]) {
            i += 1;
            continue;
        }
        let mut run = vec![ring[i]];
        let mut j = (i + 1) % n;
        while j != i && is_gap_edge(&ring[j]) {
            run.push(ring[j]);
            j = (j + 1) % n;
        }
        i += run.len();
        runs.push(run);
        if i >= n {
            break;
        }
    }
    runs
}

/// Pass B: a dangling circuit is completely blocked if every edge's opposite is already claimed
/// by some circuit; for each node whose circuit is blocked, connects it to every neighboring
/// dangling node across the ring.
fn link_blocked_neighbors(mesh: &mut InterfaceMesh, network: &mut DislocationNetwork) {
    let dangling: Vec<NodeId> = (0..network.nodes.len()).map(NodeId).filter(|&n| network.nodes[n.0].circuit.is_some()).collect();

    for &node in &dangling {
        let Some(circuit_id) = network.nodes[node.0].circuit else { continue };
        let ring: Vec<HalfEdgeId> = ring_edges(mesh, network.circuit(circuit_id).first_edge()).collect();
        let blocked = ring.iter().all(|&e| mesh.half_edge(e).opposite().is_some_and(|opp| mesh.half_edge(opp).circuit().is_some()));
        network.circuit_mut(circuit_id).is_completely_blocked = blocked;
        if !blocked {
            continue;
        }
        for &e in &ring {
            let Some(opp) = mesh.half_edge(e).opposite() else { continue };
            let Some(neighbor_circuit) = mesh.half_edge(opp).circuit() else { continue };
            let neighbor_owner = network.circuit(neighbor_circuit).owner();
            if neighbor_owner == node {
                continue;
            }
            if network.nodes[neighbor_owner.0].circuit != Some(neighbor_circuit) {
                continue;
            }
            network.connect_nodes(node, neighbor_owner);
        }
    }
}

/// Pass C: dissolves any junction ring containing a node whose circuit is not completely
/// blocked, then materializes every surviving ring of fully blocked nodes.
fn materialize_rings(network: &mut DislocationNetwork) {
    let node_count = network.nodes.len();

    for i in 0..node_count {
        let node = NodeId(i);
        let is_blocked = network.nodes[i].circuit.is_some_and(|c| network.circuit(c).is_completely_blocked());
        if network.nodes[i].junction_ring != node && !is_blocked {
            network.isolate_from_ring(node);
        }
    }

    let mut visited = vec![false; node_count];
    for i in 0..node_count {
        if visited[i] {
            continue;
        }
        let start = NodeId(i);
        let ring: Vec<NodeId> = network.junction_ring(start).collect();
        for &n in &ring {
            visited[n.0] = true;
        }
        if ring.len() < 2 {
            continue;
        }
        if ring.iter().any(|&n| !network.nodes[n.0].circuit.is_some_and(|c| network.circuit(c).is_completely_blocked())) {
            continue;
        }

        match ring.len() {
            2 => materialize_pair(network, ring[0], ring[1]),
            _ => materialize_junction(network, &ring),
        }
    }
}

/// A 2-arm ring: either both ends of the same segment (close it into a loop) or two distinct
/// segments (splice them into one, marking the absorbed one `replacedWith`).
fn materialize_pair(network: &mut DislocationNetwork, a: NodeId, b: NodeId) {
    let seg_a = network.nodes[a.0].segment;
    let seg_b = network.nodes[b.0].segment;

    if seg_a == seg_b {
        let first = *network.segments[seg_a.0].line.front().expect("segment has at least one point");
        network.segments[seg_a.0].line.push_back(first);
        network.nodes[a.0].circuit = None;
        network.nodes[b.0].circuit = None;
        return;
    }

    let a_is_forward = network.segments[seg_a.0].forward == a;
    let b_is_forward = network.segments[seg_b.0].forward == b;

    let (mut combined_line, mut combined_core, new_backward, new_forward) = match (a_is_forward, b_is_forward) {
        (true, false) => {
            let mut line = network.segments[seg_a.0].line.clone();
            line.extend(network.segments[seg_b.0].line.iter().copied());
            let mut core = network.segments[seg_a.0].core_size.clone();
            core.extend(network.segments[seg_b.0].core_size.iter().copied());
            (line, core, network.segments[seg_a.0].backward, network.segments[seg_b.0].forward)
        }
        (false, true) => {
            let mut line = network.segments[seg_b.0].line.clone();
            line.extend(network.segments[seg_a.0].line.iter().copied());
            let mut core = network.segments[seg_b.0].core_size.clone();
            core.extend(network.segments[seg_a.0].core_size.iter().copied());
            (line, core, network.segments[seg_b.0].backward, network.segments[seg_a.0].forward)
        }
        (true, true) => {
            let mut line = network.segments[seg_a.0].line.clone();
            let mut rev_b = network.segments[seg_b.0].line.clone();
            rev_b.make_contiguous().reverse();
            line.extend(rev_b.iter().copied());
            let mut core = network.segments[seg_a.0].core_size.clone();
            let mut rev_b_core = network.segments[seg_b.0].core_size.clone();
            rev_b_core.make_contiguous().reverse();
            core.extend(rev_b_core.iter().copied());
            (line, core, network.segments[seg_a.0].backward, network.segments[seg_b.0].backward)
        }
        (false, false) => {
            let mut rev_a = network.segments[seg_a.0].line.clone();
            rev_a.make_contiguous().reverse();
            rev_a.extend(network.segments[seg_b.0].line.iter().copied());
            let mut rev_a_core = network.segments[seg_a.0].core_size.clone();
            rev_a_core.make_contiguous().reverse();
            rev_a_core.extend(network.segments[seg_b.0].core_size.iter().copied());
            (rev_a, rev_a_core, network.segments[seg_a.0].forward, network.segments[seg_b.0].forward)
        }
    };

    std::mem::swap(&mut network.segments[seg_a.0].line, &mut combined_line);
    std::mem::swap(&mut network.segments[seg_a.0].core_size, &mut combined_core);
    network.segments[seg_a.0].backward = new_backward;
    network.segments[seg_a.0].forward = new_forward;
    network.segments[seg_b.0].replaced_with = Some(seg_a);

    // The remaining open ends now belong to the merged segment (relevant when one of them was
    // originally `b`'s); `a` and `b` themselves are absorbed into the interior and stop dangling.
    network.nodes[new_backward.0].segment = seg_a;
    network.nodes[new_forward.0].segment = seg_a;
    network.nodes[a.0].circuit = None;
    network.nodes[b.0].circuit = None;
}

/// A ring of three or more arms: a real junction. Every arm's line is extended to the ring's
/// center of mass and its circuit stops dangling.
fn materialize_junction(network: &mut DislocationNetwork, ring: &[NodeId]) {
    let mut center = Vector3::zeros();
    for &n in ring {
        let segment = &network.segments[network.nodes[n.0].segment.0];
        let point = if segment.forward == n { segment.line.back() } else { segment.line.front() };
        center += point.copied().unwrap_or_else(Vector3::zeros);
    }
    center /= ring.len() as f64;

    for &n in ring {
        network.push_line_point(n, center);
        if let Some(circuit_id) = network.nodes[n.0].circuit {
            network.circuit_mut(circuit_id).is_dangling = false;
            network.nodes[n.0].circuit = None;
        }
    }
}

/// Step 4 of the outer loop: once the trial-circuit budget is spent, every circuit still tracing
/// from a dangling node gets its current ring snapshotted as the defect mesh's cap for that arm.
pub(super) fn snapshot_mesh_caps(mesh: &InterfaceMesh, network: &mut DislocationNetwork) {
    let dangling: Vec<_> = network.nodes.iter().filter_map(|n| n.circuit).collect();
    for circuit_id in dangling {
        let first = network.circuit(circuit_id).first_edge();
        let cap: Vec<HalfEdgeId> = ring_edges(mesh, first).collect();
        network.circuit_mut(circuit_id).mesh_cap = cap;
    }
}
