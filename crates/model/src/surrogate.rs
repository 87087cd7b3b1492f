use crate::errors::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// The capability set shared by all surrogate models.
///
/// A surrogate owns an ordered training set (inputs `X`, observed outputs
/// `Y`, in evaluation order) and a derived set of integral coordinate
/// indices. It is created empty, grows through [`Surrogate::update`] and
/// shrinks only through [`Surrogate::reset_data`].
///
/// The trait is object-safe so that the optimization driver and the
/// acquisition strategies can work with `dyn Surrogate` regardless of the
/// concrete model.
pub trait Surrogate: Send + Sync {
    /// Training inputs as a `(n, nx)` view, in evaluation order.
    fn xtrain(&self) -> ArrayView2<f64>;

    /// Training outputs as a `(n,)` view matching [`Surrogate::xtrain`] rows.
    fn ytrain(&self) -> ArrayView1<f64>;

    /// Indices of input coordinates restricted to integer values.
    ///
    /// Integrality does not change the fitting math; it is consumed by the
    /// acquisition layer to round candidate coordinates.
    fn iindex(&self) -> &[usize];

    /// Number of training points.
    fn ntrain(&self) -> usize {
        self.xtrain().nrows()
    }

    /// Appends new samples to the training set and refits the model.
    ///
    /// An empty addition is a no-op and leaves predictions unchanged.
    /// Fails with [`crate::ModelError::SingularFit`] when the fit system is
    /// degenerate; the training set is left untouched in that case so the
    /// caller can retry with perturbed points.
    fn update(&mut self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<()>;

    /// Predicts output values at `n` given points specified as a `(n, nx)`
    /// matrix and returns the `n` predictions as a vector.
    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Predicts output values together with a predictive standard deviation.
    ///
    /// Models without an uncertainty estimate report zero spread.
    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let values = self.predict(x)?;
        let n = values.len();
        Ok((values, Array1::zeros(n)))
    }

    /// Evaluates the pairwise similarity/covariance matrix between rows of
    /// `x` and rows of `y` (or `x` itself when `y` is `None`).
    fn eval_kernel(&self, x: &ArrayView2<f64>, y: Option<&ArrayView2<f64>>) -> Result<Array2<f64>>;

    /// Returns whether `sample` is a well-posed initial design for this
    /// model (e.g. enough affinely-independent points for an RBF fit).
    fn check_initial_design(&self, sample: &ArrayView2<f64>) -> bool;

    /// Minimum number of design points required before a first fit is
    /// well-posed, for a `dim`-dimensional input space.
    fn min_design_space_size(&self, dim: usize) -> usize;

    /// Clears the training history, keeping the model configuration.
    fn reset_data(&mut self);
}
