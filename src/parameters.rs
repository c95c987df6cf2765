//! Tunable knobs for the dislocation tracer, and the numerical tolerances used throughout.

use crate::error::{DxaError, DxaResult};

/// Lattice-vector tolerance used when testing Burgers closure for zero (`LATTICE_VECTOR_EPSILON`).
pub const LATTICE_VECTOR_EPSILON: f64 = 1e-4;

/// Atom-position tolerance used when testing physical-vector closure (`ATOM_VECTOR_EPSILON`).
pub const ATOM_VECTOR_EPSILON: f64 = 1e-4;

/// Matrix-element tolerance used when testing a Frank rotation for identity (`TRANSITION_MATRIX_EPSILON`).
pub const TRANSITION_MATRIX_EPSILON: f64 = 1e-4;

/// The default Mersenne-Twister seed for `traceSegment`'s random scan start.
pub const DEFAULT_RNG_SEED: u32 = 1;

/// Run-time parameters controlling the dislocation tracer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameters {
    /// The circuit length at which the tracer first searches for primary segments and stops
    /// extending them freely (`maxTrialCircuitSize`, default 14). Must be `>= 3`.
    pub max_trial_circuit_size: usize,
    /// How many edges beyond `max_trial_circuit_size` a circuit may still be stretched while
    /// searching for a valid closure (`circuitStretchability`, default 9).
    pub circuit_stretchability: usize,
    /// If set, segments whose Burgers vector matches no "perfect" dislocation family of the
    /// target lattice are dropped after finalization.
    pub only_perfect_dislocations: bool,
    /// Preferred crystal orientations used to disambiguate symmetry-equivalent cluster frames.
    pub preferred_crystal_orientations: Vec<crate::geometry::Matrix3>,
    /// The seed for the deterministic Mersenne-Twister RNG driving `traceSegment`'s random scan
    /// start.
    pub rng_seed: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            max_trial_circuit_size: 14,
            circuit_stretchability: 9,
            only_perfect_dislocations: false,
            preferred_crystal_orientations: Vec::new(),
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl Parameters {
    /// The largest circuit length the tracer will ever extend to
    /// (`maxExtendedBurgersCircuitSize = maxTrialCircuitSize + circuitStretchability`).
    #[must_use]
    pub const fn max_extended_burgers_circuit_size(&self) -> usize {
        self.max_trial_circuit_size + self.circuit_stretchability
    }

    /// Half of `max_trial_circuit_size`, rounded down and reduced by one: the BFS depth used by
    /// `findPrimarySegments` (`(maxBurgersCircuitSize - 1) / 2`).
    #[must_use]
    pub const fn primary_search_depth(&self) -> usize {
        (self.max_trial_circuit_size.saturating_sub(1)) / 2
    }

    /// Validates this parameter set.
    ///
    /// # Errors
    ///
    /// [`DxaError::InvalidParameters`] if `max_trial_circuit_size` is out of `[3, max_extended]`.
    pub fn validate(&self) -> DxaResult<()> {
        let max_extended = self.max_extended_burgers_circuit_size();
        if self.max_trial_circuit_size < 3 || self.max_trial_circuit_size > max_extended {
            return Err(DxaError::InvalidParameters {
                max_trial_circuit_size: self.max_trial_circuit_size,
                max_extended_burgers_circuit_size: max_extended,
            });
        }
        Ok(())
    }
}
