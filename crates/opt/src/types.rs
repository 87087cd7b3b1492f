use ndarray::{Array1, Array2, ArrayView2};
use std::fmt;
use std::time::Duration;

/// The objective function contract: called on a batch of points as a
/// `(n, nx)` array, returns one scalar per row. Non-finite outputs are
/// allowed and recorded in the run history as-is.
pub trait ObjFunc: Fn(&ArrayView2<f64>) -> Array1<f64> + Sync {}
impl<T: Fn(&ArrayView2<f64>) -> Array1<f64> + Sync> ObjFunc for T {}

/// Outcome of one optimization run. Immutable once the run completes.
#[derive(Clone, Debug)]
pub struct OptimResult {
    /// Best point found
    pub x_opt: Array1<f64>,
    /// Objective value at the best point
    pub y_opt: f64,
    /// All evaluated inputs, in evaluation order
    pub x_hist: Array2<f64>,
    /// All observed outputs, in evaluation order
    pub y_hist: Array1<f64>,
    /// Number of objective evaluations consumed
    pub n_eval: usize,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl fmt::Display for OptimResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "f* = {} at x* = {} ({} evals, {:?})",
            self.y_opt, self.x_opt, self.n_eval, self.elapsed
        )
    }
}
