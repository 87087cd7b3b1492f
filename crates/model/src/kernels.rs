//! Radial basis functions used by [`crate::RbfModel`].
//!
//! The following kernels are implemented:
//! * linear, `phi(r) = r`,
//! * cubic, `phi(r) = r^3`,
//! * thin plate spline, `phi(r) = r^2 ln(r)`.
//!
//! Each kernel declares the degree of the polynomial tail required to make
//! the interpolation system well-posed.

use ndarray::{Array2, ArrayBase, Data, Ix2};
use std::fmt;

/// A radial basis function together with the polynomial tail degree that
/// guarantees a well-posed interpolation system.
pub trait RadialBasisFunction: Send + Sync + fmt::Debug {
    /// Kernel value at radius `r >= 0`.
    fn phi(&self, r: f64) -> f64;

    /// Degree of the required polynomial tail: 0 for a constant tail,
    /// 1 for a linear tail.
    fn degree(&self) -> usize;

    /// Kernel name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Applies a kernel elementwise to a matrix of radii.
pub(crate) fn phi_matrix(
    kernel: &dyn RadialBasisFunction,
    r: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Array2<f64> {
    r.mapv(|v| kernel.phi(v))
}

/// Linear radial basis function, `phi(r) = r`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearRadialBasis;

impl RadialBasisFunction for LinearRadialBasis {
    fn phi(&self, r: f64) -> f64 {
        r
    }

    fn degree(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "Linear"
    }
}

/// Cubic radial basis function, `phi(r) = r^3`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CubicRadialBasis;

impl RadialBasisFunction for CubicRadialBasis {
    fn phi(&self, r: f64) -> f64 {
        r * r * r
    }

    fn degree(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "Cubic"
    }
}

/// Thin plate spline radial basis function, `phi(r) = r^2 ln(r)`,
/// extended by continuity with `phi(0) = 0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThinPlateRadialBasis;

impl RadialBasisFunction for ThinPlateRadialBasis {
    fn phi(&self, r: f64) -> f64 {
        if r <= f64::EPSILON {
            0.
        } else {
            r * r * r.ln()
        }
    }

    fn degree(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "ThinPlate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kernel_values() {
        assert_abs_diff_eq!(LinearRadialBasis.phi(2.), 2.);
        assert_abs_diff_eq!(CubicRadialBasis.phi(2.), 8.);
        assert_abs_diff_eq!(ThinPlateRadialBasis.phi(1.), 0.);
        assert_abs_diff_eq!(ThinPlateRadialBasis.phi(0.), 0.);
        assert_abs_diff_eq!(
            ThinPlateRadialBasis.phi(2.),
            4. * f64::ln(2.),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_tail_degrees() {
        assert_eq!(LinearRadialBasis.degree(), 0);
        assert_eq!(CubicRadialBasis.degree(), 1);
        assert_eq!(ThinPlateRadialBasis.degree(), 1);
    }
}
