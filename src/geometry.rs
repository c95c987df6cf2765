//! Cartesian and lattice-frame vector types, matrices, and the periodic simulation cell.
//!
//! Nothing in the teacher clustering library needs 3D linear algebra -- its items are opaque and
//! its "distances" are scalars produced by a caller-supplied metric. The DXA core is geometry
//! through and through (rotation matrices between lattice frames, half-edge displacement vectors,
//! Burgers circuit closures), so this module borrows [`nalgebra`] the way `atomcad`'s CSG/display
//! code does, rather than inventing a vector type from scratch.

use crate::cluster_graph::ClusterId;

/// A 3x3 matrix, used for cluster orientations and cluster-transition rotations.
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// A Cartesian 3-vector, used for atom positions and mesh displacement vectors.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Absolute tolerance used when comparing two lattice vectors for equality (`LATTICE_VECTOR_EPSILON`
/// and `ATOM_VECTOR_EPSILON` in the spec; the core uses one constant for both).
pub const LATTICE_VECTOR_EPSILON: f64 = 1e-4;

/// Absolute tolerance used when comparing two transition matrices element-wise.
pub const TRANSITION_MATRIX_EPSILON: f64 = 1e-4;

/// Returns `true` if every element of `a - b` is within `eps`.
#[must_use]
pub fn matrix_approx_eq(a: &Matrix3, b: &Matrix3, eps: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= eps)
}

/// Returns `true` if `m` is within `eps` of the identity matrix, element-wise.
#[must_use]
pub fn matrix_is_identity(m: &Matrix3, eps: f64) -> bool {
    matrix_approx_eq(m, &Matrix3::identity(), eps)
}

/// A Cartesian triple expressed in a specific cluster's local frame.
///
/// The zero vector carries no information about orientation and so may be frameless: arithmetic
/// on `ClusterVector` treats a frameless zero as compatible with any frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterVector {
    /// The Cartesian components, expressed in `frame`'s local lattice basis.
    vec: Vector3,
    /// The cluster whose local frame `vec` is expressed in. `None` only for a frameless zero.
    frame: Option<ClusterId>,
}

impl ClusterVector {
    /// Creates a vector expressed in the given cluster's frame.
    #[must_use]
    pub fn new(vec: Vector3, frame: ClusterId) -> Self {
        Self { vec, frame: Some(frame) }
    }

    /// The frameless zero vector.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            vec: Vector3::zeros(),
            frame: None,
        }
    }

    /// Returns the underlying Cartesian components.
    #[must_use]
    pub const fn local_vec(&self) -> &Vector3 {
        &self.vec
    }

    /// Returns the frame this vector is expressed in, if any.
    #[must_use]
    pub const fn frame(&self) -> Option<ClusterId> {
        self.frame
    }

    /// Returns `true` if this vector is the frameless zero vector.
    #[must_use]
    pub fn is_frameless_zero(&self) -> bool {
        self.frame.is_none()
    }

    /// Returns `true` if this vector's magnitude is within `eps` of zero.
    #[must_use]
    pub fn is_null(&self, eps: f64) -> bool {
        self.vec.norm() <= eps
    }

    /// Re-expresses this vector in `target`'s frame by applying `transition`, which must map this
    /// vector's frame to `target`.
    #[must_use]
    pub fn transformed(&self, transition_tm: &Matrix3, target: ClusterId) -> Self {
        if self.is_frameless_zero() {
            Self {
                vec: Vector3::zeros(),
                frame: Some(target),
            }
        } else {
            Self {
                vec: transition_tm * self.vec,
                frame: Some(target),
            }
        }
    }

    /// Adds `other` to this vector in place. Both vectors must already share a frame, unless one
    /// of them is the frameless zero.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        if self.is_frameless_zero() {
            *other
        } else if other.is_frameless_zero() {
            *self
        } else {
            debug_assert_eq!(
                self.frame, other.frame,
                "cannot add ClusterVectors expressed in different frames without first transforming one of them"
            );
            Self {
                vec: self.vec + other.vec,
                frame: self.frame,
            }
        }
    }

    /// Negates this vector, keeping its frame.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            vec: -self.vec,
            frame: self.frame,
        }
    }
}

/// The 3x3 cell matrix plus periodic-boundary flags that define the simulation's periodic image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationCell {
    /// Columns are the three cell vectors.
    cell_matrix: Matrix3,
    /// The inverse of `cell_matrix`, cached because every wrap/unwrap needs it.
    inverse_matrix: Matrix3,
    /// Whether the cell is periodic along each of its three axes.
    pbc_flags: [bool; 3],
}

impl SimulationCell {
    /// Creates a new simulation cell.
    ///
    /// # Errors
    ///
    /// Returns [`DegenerateCell`](crate::error::DxaError::DegenerateCell) if `cell_matrix` has
    /// (numerically) zero determinant.
    pub fn new(cell_matrix: Matrix3, pbc_flags: [bool; 3]) -> crate::error::DxaResult<Self> {
        let det = cell_matrix.determinant();
        if det.abs() <= f64::EPSILON {
            return Err(crate::error::DxaError::DegenerateCell);
        }
        let inverse_matrix = cell_matrix
            .try_inverse()
            .ok_or(crate::error::DxaError::DegenerateCell)?;
        Ok(Self {
            cell_matrix,
            inverse_matrix,
            pbc_flags,
        })
    }

    /// The 3x3 cell matrix, columns are the cell vectors.
    #[must_use]
    pub const fn cell_matrix(&self) -> &Matrix3 {
        &self.cell_matrix
    }

    /// Whether the cell is periodic along axis `i`.
    #[must_use]
    pub const fn is_periodic(&self, axis: usize) -> bool {
        self.pbc_flags[axis]
    }

    /// The cell's volume, the absolute value of `cell_matrix`'s determinant.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.cell_matrix.determinant().abs()
    }

    /// Converts a point in reduced (fractional) cell coordinates to absolute Cartesian coordinates.
    #[must_use]
    pub fn reduced_to_absolute(&self, reduced: &Vector3) -> Vector3 {
        self.cell_matrix * reduced
    }

    /// Converts a point in absolute Cartesian coordinates to reduced (fractional) cell coordinates.
    #[must_use]
    pub fn absolute_to_reduced(&self, absolute: &Vector3) -> Vector3 {
        self.inverse_matrix * absolute
    }

    /// Wraps a Cartesian displacement vector into the cell's minimum image along the periodic
    /// axes, leaving non-periodic axes untouched.
    #[must_use]
    pub fn wrap_vector(&self, vector: &Vector3) -> Vector3 {
        let mut reduced = self.absolute_to_reduced(vector);
        for axis in 0..3 {
            if self.pbc_flags[axis] {
                reduced[axis] -= reduced[axis].round();
            }
        }
        self.reduced_to_absolute(&reduced)
    }

    /// Returns `true` if `vector`'s reduced-coordinate component along any periodic axis has
    /// magnitude strictly greater than one half -- i.e. the vector spans more than half a
    /// periodic image and is therefore ambiguous as a minimum-image displacement.
    ///
    /// Returns the first offending axis as `Err` for callers that want to report
    /// [`SimulationCellTooSmall`](crate::error::DxaError::SimulationCellTooSmall).
    pub fn check_not_wrapped(&self, vector: &Vector3) -> Result<(), usize> {
        let reduced = self.absolute_to_reduced(vector);
        for axis in 0..3 {
            if self.pbc_flags[axis] && reduced[axis].abs() > 0.5 + 1e-9 {
                return Err(axis);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_vector_brings_displacement_into_minimum_image() {
        let cell = SimulationCell::new(Matrix3::identity() * 10.0, [true, true, true]).expect("valid cell");
        let v = Vector3::new(7.0, -6.0, 0.2);
        let wrapped = cell.wrap_vector(&v);
        assert!(wrapped.x <= 5.0 + 1e-9 && wrapped.x >= -5.0 - 1e-9);
        assert!((wrapped - Vector3::new(-3.0, 4.0, 0.2)).norm() < 1e-9);
    }

    #[test]
    fn check_not_wrapped_flags_over_half_image_edges() {
        let cell = SimulationCell::new(Matrix3::identity() * 2.0, [true, true, true]).expect("valid cell");
        assert_eq!(cell.check_not_wrapped(&Vector3::new(1.5, 0.0, 0.0)), Err(0));
        assert_eq!(cell.check_not_wrapped(&Vector3::new(0.5, 0.0, 0.0)), Ok(()));
    }

    #[test]
    fn degenerate_cell_is_rejected() {
        let singular = Matrix3::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert!(SimulationCell::new(singular, [true, true, true]).is_err());
    }
}
