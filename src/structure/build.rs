//! Groups atoms into clusters with an average orientation and emits the transition rotations
//! between adjacent clusters, building the [`ClusterGraph`].

use rayon::prelude::*;

use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::geometry::Matrix3;
use crate::progress::{NullProgress, Progress};

use super::{CrystalStructure, StructureAnalysisInput};

/// How far two neighboring atoms' local orientations may differ (element-wise, on the matrix
/// mapping one to the other) and still be folded into the same cluster rather than linked by a
/// cluster transition.
const SAME_CLUSTER_ORIENTATION_TOLERANCE: f64 = 1e-2;

/// The result of grouping atoms into clusters: the graph itself, plus each atom's cluster.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    /// The constructed cluster graph.
    pub graph: ClusterGraph,
    /// `clusters[i]` is the cluster atom `i` was assigned to (possibly the null cluster).
    pub clusters: Vec<ClusterId>,
}

/// Groups `input`'s atoms into clusters of consistent crystal structure and orientation, then
/// emits the distance-1 transitions between clusters that share a bond.
#[must_use]
pub fn build_cluster_graph(input: &StructureAnalysisInput) -> ClusterAssignment {
    build_cluster_graph_with_progress(input, &mut NullProgress)
}

/// As [`build_cluster_graph`], but reporting progress and honoring cancellation.
///
/// Returns the default (empty, just-the-null-cluster) assignment if canceled.
pub fn build_cluster_graph_with_progress(input: &StructureAnalysisInput, progress: &mut impl Progress) -> ClusterAssignment {
    let n = input.len();
    let mut graph = ClusterGraph::new();

    if n == 0 {
        return ClusterAssignment {
            graph,
            clusters: Vec::new(),
        };
    }

    // Embarrassingly parallel: for each crystalline atom, find which of its neighbors it should
    // be unioned with, independent of every other atom's decision.
    let same_cluster_links: Vec<Vec<usize>> = input
        .atoms
        .par_iter()
        .enumerate()
        .map(|(i, atom)| {
            if !atom.structure.is_crystalline() {
                return Vec::new();
            }
            atom.neighbors
                .iter()
                .filter(|bond| bond.neighbor > i)
                .filter_map(|bond| {
                    let neighbor = input.atoms.get(bond.neighbor)?;
                    if neighbor.structure == atom.structure
                        && same_orientation(&atom.local_orientation, &neighbor.local_orientation)
                    {
                        Some(bond.neighbor)
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect();

    // Single-threaded from here: union-find and graph construction share mutable state.
    let mut uf = UnionFind::new(n);
    for (i, links) in same_cluster_links.iter().enumerate() {
        for &j in links {
            uf.union(i, j);
        }
    }

    // One raw cluster per union-find root that contains at least one crystalline atom.
    let mut root_to_cluster: std::collections::HashMap<usize, ClusterId> = std::collections::HashMap::new();
    let mut cluster_orientations: std::collections::HashMap<ClusterId, Vec<Matrix3>> = std::collections::HashMap::new();
    let mut cluster_structures: std::collections::HashMap<ClusterId, CrystalStructure> = std::collections::HashMap::new();
    let mut clusters = vec![ClusterId::NULL; n];

    for i in 0..n {
        let atom = &input.atoms[i];
        if !atom.structure.is_crystalline() {
            continue;
        }
        let root = uf.find(i);
        let cluster_id = *root_to_cluster.entry(root).or_insert_with(|| {
            let id = graph.create_cluster(atom.structure);
            cluster_structures.insert(id, atom.structure);
            id
        });
        clusters[i] = cluster_id;
        cluster_orientations.entry(cluster_id).or_default().push(atom.local_orientation);
    }

    for (&cluster_id, orientations) in &cluster_orientations {
        let averaged = average_orientation(orientations);
        graph.set_cluster_orientation_and_count(cluster_id, averaged, orientations.len());
    }

    // Emit distance-1 transitions for every bond that crosses a cluster boundary.
    let maximum = n as u64;
    let mut ticker = crate::progress::ProgressTicker::new(progress, maximum);
    for (i, atom) in input.atoms.iter().enumerate() {
        let ci = clusters[i];
        if !ci.is_null() {
            for bond in &atom.neighbors {
                let cj = clusters[bond.neighbor];
                if cj.is_null() || cj == ci {
                    continue;
                }
                let oi = *graph.find_cluster(ci).expect("just assigned").orientation();
                let oj = *graph.find_cluster(cj).expect("just assigned").orientation();
                // Maps a vector in i's local frame to j's local frame by going through the
                // shared simulation frame: v_j = oj^-1 * oi * v_i.
                if let Some(oj_inv) = oj.try_inverse() {
                    let tm = oj_inv * oi;
                    graph.register_transition_bond(ci, cj, tm);
                }
            }
        }
        if ticker.tick(i as u64 + 1).is_err() {
            return ClusterAssignment {
                graph: ClusterGraph::new(),
                clusters: vec![ClusterId::NULL; n],
            };
        }
    }

    ClusterAssignment { graph, clusters }
}

fn same_orientation(a: &Matrix3, b: &Matrix3) -> bool {
    crate::geometry::matrix_approx_eq(a, b, SAME_CLUSTER_ORIENTATION_TOLERANCE)
}

/// Averages a set of near-identical rotation matrices and projects the result back onto the
/// nearest orthogonal matrix via its polar decomposition (`U * V^T` from the SVD).
fn average_orientation(orientations: &[Matrix3]) -> Matrix3 {
    let mut sum = Matrix3::zeros();
    for o in orientations {
        sum += o;
    }
    let mean = sum / (orientations.len() as f64);
    let svd = mean.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => u * v_t,
        _ => mean,
    }
}

/// A minimal union-find (disjoint set) structure with path compression and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            self.parent[ra] = rb;
            self.size[rb] += self.size[ra];
        } else {
            self.parent[rb] = ra;
            self.size[ra] += self.size[rb];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{AtomStructureInput, NeighborBond};
    use crate::Vector3;

    #[test]
    fn single_grain_collapses_to_one_cluster() {
        let frame = Matrix3::identity();
        let atoms = (0..4)
            .map(|i| AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: frame,
                neighbors: if i == 0 {
                    vec![NeighborBond {
                        neighbor: 1,
                        lattice_vector: Vector3::new(1.0, 0.0, 0.0),
                    }]
                } else {
                    Vec::new()
                },
            })
            .collect();
        let input = StructureAnalysisInput { atoms };
        let assignment = build_cluster_graph(&input);

        assert_eq!(assignment.clusters[0], assignment.clusters[1]);
        assert!(!assignment.clusters[0].is_null());
        assert_eq!(assignment.clusters[2], ClusterId::NULL);
    }

    #[test]
    fn empty_input_has_only_the_null_cluster() {
        let assignment = build_cluster_graph(&StructureAnalysisInput::default());
        assert!(assignment.clusters.is_empty());
        assert!(assignment.graph.find_cluster(ClusterId::NULL).is_some());
    }
}
