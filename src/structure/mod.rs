//! The "SA glue": consuming a per-atom coordination-structure classification and per-atom ordered
//! neighbor lists (produced by Common-Neighbor-Analysis, out of scope for this crate) and turning
//! them into the [`crate::cluster_graph::ClusterGraph`] that every later phase builds on.

mod build;
mod input;

pub use build::{build_cluster_graph, build_cluster_graph_with_progress};
pub use input::{AtomStructureInput, NeighborBond, StructureAnalysisInput};

/// The coordination structure an atom was classified as, consumed from the host's
/// Common-Neighbor-Analysis modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrystalStructure {
    /// No recognized coordination structure ("other"), or the null cluster.
    #[default]
    Other,
    /// Face-centered cubic.
    Fcc,
    /// Hexagonal close-packed.
    Hcp,
    /// Body-centered cubic.
    Bcc,
    /// Cubic diamond.
    CubicDiamond,
    /// Hexagonal diamond.
    HexDiamond,
}

impl CrystalStructure {
    /// Returns `true` if an atom of this structure can belong to a non-null cluster.
    #[must_use]
    pub const fn is_crystalline(self) -> bool {
        !matches!(self, Self::Other)
    }
}
