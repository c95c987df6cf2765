//! The `Cluster` node of the [`super::ClusterGraph`].

use crate::geometry::Matrix3;
use crate::structure::CrystalStructure;

use super::TransitionId;

/// A stable index into a [`super::ClusterGraph`]'s cluster arena.
///
/// Id `0` is reserved for the null cluster ("no crystal"); every graph is created with it
/// present, so a fresh [`ClusterId`] is always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterId(pub(crate) usize);

impl ClusterId {
    /// The id of the null cluster, always present in a fresh graph.
    pub const NULL: Self = Self(0);

    /// Returns the raw index backing this id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns `true` if this is the null cluster.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A maximal contiguous region of atoms sharing one crystal structure and a consistent local
/// lattice orientation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    pub(crate) id: ClusterId,
    pub(crate) structure: CrystalStructure,
    pub(crate) atom_count: usize,
    pub(crate) orientation: Matrix3,
    pub(crate) symmetry_permutation: Option<usize>,
    /// Head of the outgoing transition list, kept sorted by ascending `distance`. The head, if
    /// present at distance 0, is this cluster's self-transition.
    pub(crate) outgoing_head: Option<TransitionId>,
}

impl Cluster {
    /// This cluster's id.
    #[must_use]
    pub const fn id(&self) -> ClusterId {
        self.id
    }

    /// The crystal structure this cluster's atoms were classified as.
    #[must_use]
    pub const fn structure(&self) -> CrystalStructure {
        self.structure
    }

    /// The number of atoms belonging to this cluster.
    #[must_use]
    pub const fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// The 3x3 matrix mapping this cluster's local lattice frame to the simulation frame.
    #[must_use]
    pub const fn orientation(&self) -> &Matrix3 {
        &self.orientation
    }

    /// An index into the lattice's symmetry-permutation group, if one was assigned.
    #[must_use]
    pub const fn symmetry_permutation(&self) -> Option<usize> {
        self.symmetry_permutation
    }

    /// Returns `true` if this is the null cluster (id 0, "no crystal").
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.id.is_null()
    }

    pub(crate) fn increment_atom_count(&mut self) {
        self.atom_count += 1;
    }
}
