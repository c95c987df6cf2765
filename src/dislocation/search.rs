//! Finds primary Burgers circuits by a bounded breadth-first search from every mesh vertex
//! (§4.5.1), and turns a validated candidate ring into a traced segment (§4.5.2, §4.5.4).

use std::collections::{HashMap, VecDeque};

use crate::cluster_graph::ClusterGraph;
use crate::elastic_mapping::ElasticMapping;
use crate::geometry::Matrix3;
use crate::interface_mesh::{CircuitId, HalfEdgeId, InterfaceMesh, VertexId};

use super::circuit::{is_valid_dislocation_ring, link_ring, ring_is_unclaimed};
use super::{BurgersCircuit, DislocationNetwork};

/// One BFS frontier record: the path of edges from the seed vertex, the accumulated lattice
/// position in the seed's frame, and the transform from the current vertex's local frame to the
/// seed's frame.
#[derive(Clone)]
struct Visit {
    path: Vec<HalfEdgeId>,
    seed_to_here: Matrix3,
}

/// Searches every mesh vertex for a closed Burgers circuit of total length `circuit_length`,
/// tracing and recording each one found.
pub(super) fn find_primary_segments(
    mesh: &mut InterfaceMesh,
    graph: &ClusterGraph,
    _mapping: &ElasticMapping,
    network: &mut DislocationNetwork,
    circuit_length: usize,
    rng: &mut rand_mt::Mt,
) {
    let depth = circuit_length.saturating_sub(1) / 2;
    let vertex_count = mesh.vertex_count();
    for v in 0..vertex_count {
        if let Some(ring) = seed_candidate(mesh, graph, VertexId(v), depth) {
            create_and_trace(mesh, graph, network, &ring, circuit_length, true, rng);
        }
    }
}

/// Runs a bounded BFS from `start` and returns the first valid candidate ring found, if any.
fn seed_candidate(mesh: &InterfaceMesh, graph: &ClusterGraph, start: VertexId, depth: usize) -> Option<Vec<HalfEdgeId>> {
    let mut visited: HashMap<VertexId, Visit> = HashMap::new();
    visited.insert(
        start,
        Visit {
            path: Vec::new(),
            seed_to_here: Matrix3::identity(),
        },
    );
    let mut depth_of: HashMap<VertexId, usize> = HashMap::new();
    depth_of.insert(start, 0);
    let mut frontier: VecDeque<VertexId> = VecDeque::new();
    frontier.push_back(start);

    while let Some(cur) = frontier.pop_front() {
        let cur_depth = depth_of[&cur];
        if cur_depth >= depth {
            continue;
        }
        let cur_visit = visited[&cur].clone();

        for &e in mesh.vertex(cur).outgoing() {
            let he = mesh.half_edge(e);
            if he.circuit().is_some() {
                continue;
            }
            if mesh.face(he.face()).swept_by().is_some() {
                continue;
            }
            let far = he.head();
            let tm_cur_to_far = *graph.transition(he.cluster_transition()).tm();
            let Some(tm_far_to_cur) = tm_cur_to_far.try_inverse() else { continue };
            let far_to_seed = cur_visit.seed_to_here * tm_far_to_cur;

            if let Some(existing) = visited.get(&far) {
                if existing.path.last().copied() == mesh.half_edge(e).opposite() {
                    continue;
                }
                if let Some(ring) = assemble_ring(mesh, &cur_visit.path, e, &existing.path) {
                    if ring_is_unclaimed(mesh, &ring) && is_valid_dislocation_ring(mesh, graph, &ring) {
                        return Some(ring);
                    }
                }
                continue;
            }

            let mut new_path = cur_visit.path.clone();
            new_path.push(e);
            visited.insert(
                far,
                Visit {
                    path: new_path,
                    seed_to_here: far_to_seed,
                },
            );
            depth_of.insert(far, cur_depth + 1);
            frontier.push_back(far);
        }
    }

    None
}

/// Builds the closed ring `start -> cur -> far -> start`: the forward path to `cur`, the
/// triggering edge `e`, then the reverse of the path to `far` (walked via opposite edges).
fn assemble_ring(mesh: &InterfaceMesh, path_to_cur: &[HalfEdgeId], e: HalfEdgeId, path_to_far: &[HalfEdgeId]) -> Option<Vec<HalfEdgeId>> {
    let mut ring = path_to_cur.to_vec();
    ring.push(e);
    for &edge in path_to_far.iter().rev() {
        ring.push(mesh.half_edge(edge).opposite()?);
    }
    Some(ring)
}

/// Allocates a new segment for a validated ring, links its edges into a circuit, seeds the line
/// with the circuit's centroid, and hands off to [`super::trace::trace_segment`] for the first
/// moves. Shared by primary search (§4.5.1) and secondary gap-filling (§4.5.6 pass A).
pub(super) fn create_and_trace(
    mesh: &mut InterfaceMesh,
    graph: &ClusterGraph,
    network: &mut DislocationNetwork,
    ring: &[HalfEdgeId],
    circuit_length: usize,
    is_primary: bool,
    rng: &mut rand_mt::Mt,
) {
    let (burgers, _frank) = super::circuit::burgers_and_frank_over(mesh, graph, ring.iter().copied());
    let frame = mesh
        .vertex(mesh.half_edge(ring[0]).tail())
        .outgoing()
        .first()
        .map(|&e| mesh.half_edge(e).cluster_vector().frame());
    let Some(Some(frame)) = frame else { return };
    let burgers_vector = crate::geometry::ClusterVector::new(burgers, frame);

    let centroid = ring_centroid(mesh, ring);
    let (_seg_id, backward, forward) = network.allocate_segment(burgers_vector, centroid);

    let circuit_id = CircuitId(network.circuits.len());
    network.circuits.push(BurgersCircuit {
        first_edge: ring[0],
        edge_count: ring.len(),
        owner: backward,
        preliminary_points: 1,
        mesh_cap: Vec::new(),
        is_dangling: true,
        is_completely_blocked: false,
        is_primary,
    });
    link_ring(mesh, ring, circuit_id);
    network.nodes[backward.0].circuit = Some(circuit_id);

    // The forward node gets a second circuit, the reverse ring walking the same edges from the
    // opposite side, per `buildReverseCircuit`.
    if let Some(reverse_ring) = super::circuit::build_reverse_ring(mesh, ring) {
        let reverse_id = CircuitId(network.circuits.len());
        network.circuits.push(BurgersCircuit {
            first_edge: reverse_ring[0],
            edge_count: reverse_ring.len(),
            owner: forward,
            preliminary_points: 1,
            mesh_cap: Vec::new(),
            is_dangling: true,
            is_completely_blocked: false,
            is_primary,
        });
        network.nodes[forward.0].circuit = Some(reverse_id);
    }

    super::trace::trace_segment(mesh, graph, network, backward, circuit_length, rng);
    super::trace::trace_segment(mesh, graph, network, forward, circuit_length, rng);
}

/// The average vertex position reached by walking the ring's cumulative physical vectors from
/// its first tail -- the circuit's center of mass, used as the segment's seed line point.
fn ring_centroid(mesh: &InterfaceMesh, ring: &[HalfEdgeId]) -> crate::geometry::Vector3 {
    let start = mesh.half_edge(ring[0]).tail();
    let origin = *mesh.vertex(start).position();
    let mut cumulative = crate::geometry::Vector3::zeros();
    let mut sum = crate::geometry::Vector3::zeros();
    for &e in ring {
        sum += cumulative;
        cumulative += mesh.half_edge(e).physical_vector();
    }
    origin + sum / (ring.len() as f64)
}
