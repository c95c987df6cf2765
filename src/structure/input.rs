//! Inputs consumed from the (out-of-scope) Common-Neighbor-Analysis modifier.

use crate::geometry::{Matrix3, Vector3};

use super::CrystalStructure;

/// One ordered neighbor of an atom, as produced by the host's structure-matching template.
///
/// `lattice_vector` is the ideal lattice vector from the owning atom to `neighbor`, expressed in
/// the owning atom's locally-fitted lattice frame.
#[derive(Debug, Clone, Copy)]
pub struct NeighborBond {
    /// Index of the neighboring atom.
    pub neighbor: usize,
    /// The ideal lattice vector from the owner to `neighbor`, in the owner's local frame.
    pub lattice_vector: Vector3,
}

/// Everything Structure Analysis has already determined about one atom.
#[derive(Debug, Clone)]
pub struct AtomStructureInput {
    /// The atom's coordination-structure classification.
    pub structure: CrystalStructure,
    /// The local lattice frame fitted to this atom's neighborhood, mapping the lattice basis to
    /// the simulation frame. Meaningless (and ignored) when `structure` is
    /// [`CrystalStructure::Other`].
    pub local_orientation: Matrix3,
    /// This atom's ordered neighbor list.
    pub neighbors: Vec<NeighborBond>,
}

/// Per-atom input to [`super::build_cluster_graph`].
#[derive(Debug, Clone, Default)]
pub struct StructureAnalysisInput {
    /// Per-atom classification, orientation, and neighbor list, indexed by atom index.
    pub atoms: Vec<AtomStructureInput>,
}

impl StructureAnalysisInput {
    /// The number of atoms in this input.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Returns `true` if there are no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
