//! Classifies each tetrahedron of the input tessellation as "good" (the elastic mapping is
//! compatible and disclination-free inside it) or "bad".

use crate::cluster_graph::ClusterGraph;
use crate::elastic_mapping::{is_elastic_mapping_compatible, ElasticMapping};
use crate::tessellation::Tessellation;

/// The outcome of classifying every cell of the input tessellation.
#[derive(Debug, Clone)]
pub struct TetrahedronClassification {
    /// `good[i]` is `true` if cell `i`'s elastic mapping is compatible.
    good: Vec<bool>,
    /// `mesh_index[i]` is `Some(consecutive index)` for primary good cells, `None` otherwise
    /// (including all ghost cells, per the ghost-cell convention).
    mesh_index: Vec<Option<usize>>,
    /// `true` if every primary cell is good.
    is_completely_good: bool,
    /// `true` if every primary cell is bad.
    is_completely_bad: bool,
}

impl TetrahedronClassification {
    /// Returns `true` if cell `i`'s elastic mapping is compatible.
    #[must_use]
    pub fn is_good(&self, cell: usize) -> bool {
        self.good[cell]
    }

    /// The consecutive index assigned to primary good cell `cell`, if any.
    #[must_use]
    pub fn mesh_index(&self, cell: usize) -> Option<usize> {
        self.mesh_index[cell]
    }

    /// `true` if every primary cell in the tessellation is good.
    #[must_use]
    pub const fn is_completely_good(&self) -> bool {
        self.is_completely_good
    }

    /// `true` if every primary cell in the tessellation is bad.
    #[must_use]
    pub const fn is_completely_bad(&self) -> bool {
        self.is_completely_bad
    }
}

/// Classifies every cell of `tess` as good or bad, and assigns consecutive indices to primary good
/// cells.
#[must_use]
pub fn classify_tetrahedra(tess: &impl Tessellation, mapping: &ElasticMapping, graph: &ClusterGraph) -> TetrahedronClassification {
    let n = tess.cell_count();
    let mut good = Vec::with_capacity(n);
    let mut mesh_index = Vec::with_capacity(n);
    let mut next_index = 0usize;
    let mut any_primary = false;
    let mut all_primary_good = true;
    let mut all_primary_bad = true;

    for i in 0..n {
        let tet = tess.cell(i);
        let is_good = is_elastic_mapping_compatible(mapping, graph, &tet);
        good.push(is_good);

        if tet.is_ghost {
            mesh_index.push(None);
        } else {
            any_primary = true;
            all_primary_good &= is_good;
            all_primary_bad &= !is_good;
            if is_good {
                mesh_index.push(Some(next_index));
                next_index += 1;
            } else {
                mesh_index.push(None);
            }
        }
    }

    TetrahedronClassification {
        good,
        mesh_index,
        is_completely_good: any_primary && all_primary_good,
        is_completely_bad: any_primary && all_primary_bad,
    }
}
