//! Burgers circuit search, segment tracing, junction formation, and finalization.
//!
//! This is the largest component of the pipeline: everything here operates on the half-edge
//! [`crate::interface_mesh::InterfaceMesh`] built by the previous stage, marking its edges and
//! faces as circuits sweep across them.

mod circuit;
mod finalize;
mod join;
mod search;
mod trace;

pub use circuit::BurgersCircuit;
pub use finalize::finish_dislocation_segments;

use crate::cluster_graph::ClusterGraph;
use crate::elastic_mapping::ElasticMapping;
use crate::geometry::{ClusterVector, Vector3};
use crate::interface_mesh::{CircuitId, InterfaceMesh};
use crate::parameters::Parameters;
use crate::progress::Progress;

/// A stable index into a [`DislocationNetwork`]'s segment arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentId(pub(crate) usize);

/// A stable index into a [`DislocationNetwork`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) usize);

/// One piecewise-linear dislocation line, delimited by a node at each end.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DislocationSegment {
    pub(crate) id: usize,
    pub(crate) burgers_vector: ClusterVector,
    pub(crate) line: std::collections::VecDeque<Vector3>,
    pub(crate) core_size: std::collections::VecDeque<usize>,
    pub(crate) forward: NodeId,
    pub(crate) backward: NodeId,
    pub(crate) replaced_with: Option<SegmentId>,
}

impl DislocationSegment {
    /// This segment's (post-finalization) consecutive id.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// The Burgers vector characterizing this dislocation.
    #[must_use]
    pub const fn burgers_vector(&self) -> &ClusterVector {
        &self.burgers_vector
    }

    /// The polyline, in simulation coordinates.
    #[must_use]
    pub fn line(&self) -> &std::collections::VecDeque<Vector3> {
        &self.line
    }

    /// The Burgers-circuit edge count sampled at each line point.
    #[must_use]
    pub fn core_size(&self) -> &std::collections::VecDeque<usize> {
        &self.core_size
    }

    /// The node at the line's end.
    #[must_use]
    pub const fn forward(&self) -> NodeId {
        self.forward
    }

    /// The node at the line's start.
    #[must_use]
    pub const fn backward(&self) -> NodeId {
        self.backward
    }

    /// The segment this one was absorbed into, if any.
    #[must_use]
    pub const fn replaced_with(&self) -> Option<SegmentId> {
        self.replaced_with
    }

    /// Reverses this segment's line and negates its Burgers vector, swapping `forward`/`backward`.
    pub(crate) fn flip_orientation(&mut self) {
        self.line.make_contiguous().reverse();
        self.core_size.make_contiguous().reverse();
        self.burgers_vector = self.burgers_vector.negated();
        std::mem::swap(&mut self.forward, &mut self.backward);
    }
}

/// One endpoint of a [`DislocationSegment`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DislocationNode {
    pub(crate) segment: SegmentId,
    /// The other node delimiting the same segment.
    pub(crate) opposite: NodeId,
    /// Next node in this node's junction ring; equals `self`'s own id when dangling.
    pub(crate) junction_ring: NodeId,
    /// The circuit currently tracing from this node, while it remains dangling.
    pub(crate) circuit: Option<CircuitId>,
}

impl DislocationNode {
    /// The segment this node delimits.
    #[must_use]
    pub const fn segment(&self) -> SegmentId {
        self.segment
    }

    /// The opposite node of the same segment.
    #[must_use]
    pub const fn opposite(&self) -> NodeId {
        self.opposite
    }

    /// The next node sharing this node's junction.
    #[must_use]
    pub const fn junction_ring(&self) -> NodeId {
        self.junction_ring
    }

    /// The circuit tracing from this node, if it is still dangling.
    #[must_use]
    pub const fn circuit(&self) -> Option<CircuitId> {
        self.circuit
    }
}

/// Owns every segment, node, and circuit produced while tracing dislocations on one interface
/// mesh.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DislocationNetwork {
    pub(crate) segments: Vec<DislocationSegment>,
    pub(crate) nodes: Vec<DislocationNode>,
    pub(crate) circuits: Vec<BurgersCircuit>,
}

impl DislocationNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The segments traced so far, including those later absorbed into others (check
    /// [`DislocationSegment::replaced_with`]).
    #[must_use]
    pub fn segments(&self) -> &[DislocationSegment] {
        &self.segments
    }

    /// The number of nodes allocated so far (two per segment ever created, live or absorbed).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DislocationNode {
        &self.nodes[id.0]
    }

    /// Looks up a circuit by id.
    #[must_use]
    pub fn circuit(&self, id: CircuitId) -> &BurgersCircuit {
        &self.circuits[id.0]
    }

    pub(crate) fn circuit_mut(&mut self, id: CircuitId) -> &mut BurgersCircuit {
        &mut self.circuits[id.0]
    }

    /// The total length, in simulation units, of every live (non-replaced) segment's polyline.
    #[must_use]
    pub fn total_line_length(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| s.replaced_with.is_none())
            .map(|s| s.line.iter().zip(s.line.iter().skip(1)).map(|(a, b)| (b - a).norm()).sum::<f64>())
            .sum()
    }

    pub(crate) fn allocate_segment(&mut self, burgers_vector: ClusterVector, start: Vector3) -> (SegmentId, NodeId, NodeId) {
        let seg_id = SegmentId(self.segments.len());
        let backward_id = NodeId(self.nodes.len());
        let forward_id = NodeId(self.nodes.len() + 1);

        self.nodes.push(DislocationNode {
            segment: seg_id,
            opposite: forward_id,
            junction_ring: backward_id,
            circuit: None,
        });
        self.nodes.push(DislocationNode {
            segment: seg_id,
            opposite: backward_id,
            junction_ring: forward_id,
            circuit: None,
        });

        let mut line = std::collections::VecDeque::new();
        line.push_back(start);
        let mut core_size = std::collections::VecDeque::new();
        core_size.push_back(0);

        self.segments.push(DislocationSegment {
            id: seg_id.0,
            burgers_vector,
            line,
            core_size,
            forward: forward_id,
            backward: backward_id,
            replaced_with: None,
        });

        (seg_id, backward_id, forward_id)
    }

    /// Appends `point` to the end of `node`'s segment's line nearest to `node`.
    pub(crate) fn push_line_point(&mut self, node: NodeId, point: Vector3) {
        let segment = &mut self.segments[self.nodes[node.0].segment.0];
        if segment.forward == node {
            segment.line.push_back(point);
        } else {
            segment.line.push_front(point);
        }
    }

    /// Removes `node` from whatever junction ring it currently belongs to, restoring it to a
    /// singleton ring (`junction_ring(node) == node`). No-op if it is already a singleton.
    pub(crate) fn isolate_from_ring(&mut self, node: NodeId) {
        if self.nodes[node.0].junction_ring == node {
            return;
        }
        let Some(pred) = (0..self.nodes.len()).map(NodeId).find(|&n| self.nodes[n.0].junction_ring == node) else { return };
        self.nodes[pred.0].junction_ring = self.nodes[node.0].junction_ring;
        self.nodes[node.0].junction_ring = node;
    }

    /// Splices `a` and `b`'s junction rings together (the standard two-node ring swap).
    pub(crate) fn connect_nodes(&mut self, a: NodeId, b: NodeId) {
        let next_a = self.nodes[a.0].junction_ring;
        let next_b = self.nodes[b.0].junction_ring;
        self.nodes[a.0].junction_ring = next_b;
        self.nodes[b.0].junction_ring = next_a;
    }

    /// Iterates the nodes sharing `start`'s junction ring, starting with `start` itself.
    pub(crate) fn junction_ring(&self, start: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(start);
        let mut first = true;
        std::iter::from_fn(move || {
            let cur = next?;
            if !first && cur == start {
                next = None;
                return None;
            }
            first = false;
            next = Some(self.nodes[cur.0].junction_ring);
            Some(cur)
        })
    }
}

/// Runs the full outer loop: for each circuit length from 3 up to
/// `parameters.max_extended_burgers_circuit_size()`, extends every dangling circuit, searches for
/// new primary circuits at odd lengths up to `max_trial_circuit_size`, and joins touching circuits
/// into junctions. At the final length, remaining dangling circuits are snapshotted for the defect
/// mesh builder's caps.
pub fn trace_dislocation_segments(
    mesh: &mut InterfaceMesh,
    graph: &ClusterGraph,
    mapping: &ElasticMapping,
    parameters: &Parameters,
    progress: &mut impl Progress,
) -> crate::error::DxaResult<DislocationNetwork> {
    let mut network = DislocationNetwork::new();
    let mut rng = rand_mt::Mt::new(parameters.rng_seed);
    let max_extended = parameters.max_extended_burgers_circuit_size();

    for circuit_length in 3..=max_extended {
        if progress.is_canceled() {
            return Err(crate::error::DxaError::Canceled);
        }

        trace::advance_all_dangling(mesh, graph, &mut network, circuit_length, &mut rng);

        if circuit_length <= parameters.max_trial_circuit_size && circuit_length % 2 == 1 {
            search::find_primary_segments(mesh, graph, mapping, &mut network, circuit_length, &mut rng);
        }

        join::join_segments(mesh, graph, &mut network, circuit_length, &mut rng);

        if circuit_length >= parameters.max_trial_circuit_size {
            join::snapshot_mesh_caps(mesh, &mut network);
        }
    }

    finalize::finish_dislocation_segments(&mut network, graph);
    Ok(network)
}
