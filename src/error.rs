//! Error kinds raised by the pipeline.
//!
//! Numerical near-failures -- no path between two clusters, a Burgers residue barely above
//! threshold, a tessellation edge with no assignable lattice vector -- are not errors. They cause
//! the owning operation to return `None` and are absorbed by the enclosing phase. Only conditions
//! that make the whole pipeline's output meaningless are reported here.

use thiserror::Error;

/// The result type returned by pipeline phases.
pub type DxaResult<T> = Result<T, DxaError>;

/// Failure kinds that can abort the DXA pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DxaError {
    /// A tessellation edge spans more than half the periodic image along the given cell axis
    /// (0 = x, 1 = y, 2 = z). The simulation cell is too small for the chosen cutoffs.
    #[error("simulation cell is too small along axis {axis}: an edge would span more than half a periodic image")]
    SimulationCellTooSmall {
        /// The offending cell axis, 0..3.
        axis: usize,
    },

    /// The simulation cell matrix has (numerically) zero volume.
    #[error("simulation cell is degenerate (zero volume)")]
    DegenerateCell,

    /// `maxTrialCircuitSize` was out of its valid range.
    #[error("invalid parameters: max_trial_circuit_size ({max_trial_circuit_size}) must be >= 3 and <= max_extended_burgers_circuit_size ({max_extended_burgers_circuit_size})")]
    InvalidParameters {
        /// The requested `maxTrialCircuitSize`.
        max_trial_circuit_size: usize,
        /// The derived `maxExtendedBurgersCircuitSize`.
        max_extended_burgers_circuit_size: usize,
    },

    /// The caller's progress collaborator reported cancellation. The pipeline unwinds with no
    /// partial result visible to the caller.
    #[error("pipeline canceled")]
    Canceled,
}
