//! Output filters applied to observed values before an RBF fit.
//!
//! A filter is a pluggable strategy: the model stores the raw outputs and
//! feeds the filtered copy to the interpolation solve only.

use ndarray::{Array1, ArrayView1};

/// A filter applied to the vector of observed outputs before fitting.
pub trait OutputFilter: Send + Sync + std::fmt::Debug {
    /// Returns the filtered copy of `y`.
    fn apply(&self, y: &ArrayView1<f64>) -> Array1<f64>;
}

/// The identity filter, leaves outputs untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityFilter;

impl OutputFilter for IdentityFilter {
    fn apply(&self, y: &ArrayView1<f64>) -> Array1<f64> {
        y.to_owned()
    }
}

/// Median low-pass filter: values above the median of the finite outputs
/// are clamped to that median.
///
/// Large outliers otherwise dominate the interpolation and flatten the
/// surrogate everywhere else; clamping keeps the low region, which is the
/// one that matters for minimization, accurately modeled.
#[derive(Clone, Copy, Debug, Default)]
pub struct MedianLpfFilter;

impl OutputFilter for MedianLpfFilter {
    fn apply(&self, y: &ArrayView1<f64>) -> Array1<f64> {
        let mut finite: Vec<f64> = y.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return y.to_owned();
        }
        finite.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = finite.len();
        let median = if n % 2 == 1 {
            finite[n / 2]
        } else {
            (finite[n / 2 - 1] + finite[n / 2]) / 2.
        };
        y.mapv(|v| if v > median { median } else { v })
    }
}
