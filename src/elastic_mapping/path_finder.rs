//! Finds the ideal lattice vector between two nearby atoms via a path through the good crystal
//! region, for use as a [`crate::geometry::ClusterVector`] on a tessellation edge.

use std::collections::{HashSet, VecDeque};

use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::geometry::ClusterVector;
use crate::structure::StructureAnalysisInput;

/// Finds a [`ClusterVector`] giving the ideal separation between `start` and `dest`, searching
/// only through atoms whose cluster assignment is known (the "good crystal region").
///
/// `atom_clusters[i]` is the cluster atom `i` belongs to (possibly the null cluster). Depth is
/// bounded by `max_path_length` (2 by default, for edge vectors).
#[must_use]
pub fn find_path(
    start: usize,
    dest: usize,
    atom_clusters: &[ClusterId],
    input: &StructureAnalysisInput,
    graph: &mut ClusterGraph,
    max_path_length: usize,
) -> Option<ClusterVector> {
    if start == dest {
        return Some(ClusterVector::zero());
    }

    let start_frame = atom_clusters.get(start).copied().unwrap_or(ClusterId::NULL);
    if start_frame.is_null() {
        return None;
    }

    let mut visited = HashSet::new();
    visited.insert(start);

    let mut frontier = VecDeque::new();
    frontier.push_back((start, 0usize, ClusterVector::new(crate::geometry::Vector3::zeros(), start_frame)));

    while let Some((center, depth, accumulated)) = frontier.pop_front() {
        if depth >= max_path_length {
            continue;
        }
        let center_cluster = atom_clusters.get(center).copied().unwrap_or(ClusterId::NULL);
        let Some(center_atom) = input.atoms.get(center) else { continue };

        let steps: Vec<(usize, crate::geometry::Vector3, ClusterId)> = if center_cluster.is_null() {
            // The center atom itself has no crystalline assignment; fall back to a reverse
            // lookup through each neighbor's own neighbor list.
            center_atom
                .neighbors
                .iter()
                .filter_map(|bond| {
                    let neighbor = bond.neighbor;
                    let neighbor_cluster = atom_clusters.get(neighbor).copied().unwrap_or(ClusterId::NULL);
                    if neighbor_cluster.is_null() {
                        return None;
                    }
                    let neighbor_atom = input.atoms.get(neighbor)?;
                    neighbor_atom
                        .neighbors
                        .iter()
                        .find(|back| back.neighbor == center)
                        .map(|back| (neighbor, -back.lattice_vector, neighbor_cluster))
                })
                .collect()
        } else {
            center_atom
                .neighbors
                .iter()
                .map(|bond| (bond.neighbor, bond.lattice_vector, center_cluster))
                .collect()
        };

        for (neighbor, step_vector, step_frame) in steps {
            if visited.contains(&neighbor) {
                continue;
            }

            let accumulated_in_step_frame = if accumulated.frame() == Some(step_frame) {
                accumulated
            } else if let Some(t) = graph.determine_cluster_transition(accumulated.frame().unwrap_or(step_frame), step_frame) {
                accumulated.transformed(graph.transition(t).tm(), step_frame)
            } else {
                continue;
            };

            let new_accumulated = accumulated_in_step_frame.add(&ClusterVector::new(step_vector, step_frame));

            if neighbor == dest {
                return Some(new_accumulated);
            }

            visited.insert(neighbor);
            frontier.push_back((neighbor, depth + 1, new_accumulated));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_graph::ClusterGraph;
    use crate::geometry::Vector3;
    use crate::structure::{AtomStructureInput, CrystalStructure, NeighborBond};

    #[test]
    fn direct_neighbor_returns_the_bond_vector() {
        let mut graph = ClusterGraph::new();
        let c = graph.create_cluster(CrystalStructure::Fcc);
        let atoms = vec![
            AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: crate::geometry::Matrix3::identity(),
                neighbors: vec![NeighborBond {
                    neighbor: 1,
                    lattice_vector: Vector3::new(1.0, 0.0, 0.0),
                }],
            },
            AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: crate::geometry::Matrix3::identity(),
                neighbors: vec![NeighborBond {
                    neighbor: 0,
                    lattice_vector: Vector3::new(-1.0, 0.0, 0.0),
                }],
            },
        ];
        let input = StructureAnalysisInput { atoms };
        let clusters = vec![c, c];

        let found = find_path(0, 1, &clusters, &input, &mut graph, 2).expect("direct bond exists");
        assert!((found.local_vec() - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn unreachable_destination_returns_none() {
        let mut graph = ClusterGraph::new();
        let c = graph.create_cluster(CrystalStructure::Fcc);
        let atoms = vec![
            AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: crate::geometry::Matrix3::identity(),
                neighbors: vec![],
            },
            AtomStructureInput {
                structure: CrystalStructure::Fcc,
                local_orientation: crate::geometry::Matrix3::identity(),
                neighbors: vec![],
            },
        ];
        let input = StructureAnalysisInput { atoms };
        let clusters = vec![c, c];
        assert!(find_path(0, 1, &clusters, &input, &mut graph, 2).is_none());
    }
}
