//! Correlation kernels for the Gaussian-process model.
//!
//! The following kernels are implemented:
//! * squared exponential,
//! * matern 5/2.

use ndarray::ArrayView1;

/// A stationary correlation function `k(d; theta)` of the componentwise
/// absolute distance `d` between two points, parameterized by one inverse
/// length scale `theta_j` per input component.
pub trait CorrelationKernel: Send + Sync + std::fmt::Debug {
    /// Correlation value for the componentwise distance vector `d >= 0`.
    fn value(&self, d: &ArrayView1<f64>, theta: &ArrayView1<f64>) -> f64;

    /// Kernel name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Squared exponential correlation,
/// `k(d) = exp(-1/2 * sum_j (theta_j * d_j)^2)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredExponentialCorr;

impl CorrelationKernel for SquaredExponentialCorr {
    fn value(&self, d: &ArrayView1<f64>, theta: &ArrayView1<f64>) -> f64 {
        let s: f64 = d
            .iter()
            .zip(theta.iter())
            .map(|(&dj, &tj)| (tj * dj) * (tj * dj))
            .sum();
        (-0.5 * s).exp()
    }

    fn name(&self) -> &'static str {
        "SquaredExponential"
    }
}

/// Matern 5/2 correlation,
/// `k(d) = prod_j (1 + sqrt(5) a_j + 5/3 a_j^2) exp(-sqrt(5) a_j)`
/// with `a_j = theta_j * d_j`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Matern52Corr;

impl CorrelationKernel for Matern52Corr {
    fn value(&self, d: &ArrayView1<f64>, theta: &ArrayView1<f64>) -> f64 {
        const SQRT_5: f64 = 2.23606797749979;
        d.iter()
            .zip(theta.iter())
            .map(|(&dj, &tj)| {
                let a = tj * dj;
                (1. + SQRT_5 * a + 5. / 3. * a * a) * (-SQRT_5 * a).exp()
            })
            .product()
    }

    fn name(&self) -> &'static str {
        "Matern52"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_unit_correlation_at_zero_distance() {
        let d = array![0., 0.];
        let theta = array![0.3, 2.];
        assert_abs_diff_eq!(SquaredExponentialCorr.value(&d.view(), &theta.view()), 1.);
        assert_abs_diff_eq!(Matern52Corr.value(&d.view(), &theta.view()), 1.);
    }

    #[test]
    fn test_correlation_decreases_with_distance() {
        let theta = array![1.];
        for kernel in [
            &SquaredExponentialCorr as &dyn CorrelationKernel,
            &Matern52Corr,
        ] {
            let near = kernel.value(&array![0.1].view(), &theta.view());
            let far = kernel.value(&array![2.].view(), &theta.view());
            assert!(near > far);
            assert!(far > 0.);
        }
    }
}
