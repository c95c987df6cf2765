//! The Dislocation Extraction Algorithm (DXA) core.
//!
//! This crate turns a set of atomic coordinates plus a periodic simulation cell into:
//!
//! - a [`cluster_graph`]: the crystalline grains present in the configuration and the rotations
//!   relating their local lattice frames,
//! - an [`interface_mesh`]: the half-edge manifold separating crystalline from defective matter,
//! - a [`dislocation`] network: piecewise-linear curves, each carrying a Burgers vector, joined at
//!   junction nodes.
//!
//! The crate does not perform Common-Neighbor-Analysis, does not tessellate the atoms, and does
//! not render or serialize anything on its own; it consumes a per-atom coordination-structure
//! classification and a ghost-aware tetrahedralization through the [`tessellation`] and
//! [`structure`] traits, and hands back typed results through [`pipeline::run`].
//!
//! ## Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` on the output types ([`dislocation::DislocationNetwork`],
//!   [`cluster_graph::ClusterGraph`], the per-atom assignment tables) so a caller can persist a
//!   pipeline run.

pub mod cluster_graph;
pub mod defect_mesh;
pub mod dislocation;
pub mod elastic_mapping;
pub mod error;
pub mod geometry;
pub mod interface_mesh;
pub mod parameters;
pub mod pipeline;
pub mod progress;
pub mod structure;
pub mod tessellation;

pub use cluster_graph::{Cluster, ClusterGraph, ClusterId, ClusterTransition, TransitionId};
pub use defect_mesh::DefectMesh;
pub use dislocation::{DislocationNetwork, DislocationNode, DislocationSegment};
pub use error::{DxaError, DxaResult};
pub use geometry::{ClusterVector, Matrix3, SimulationCell, Vector3};
pub use parameters::Parameters;
pub use pipeline::{run, PipelineOutput};
pub use structure::CrystalStructure;
