use crate::errors::{ModelError, Result};
use crate::filter::{IdentityFilter, OutputFilter};
use crate::kernels::{CubicRadialBasis, RadialBasisFunction, phi_matrix};
use crate::surrogate::Surrogate;
use crate::utils::{is_degenerate, sanitize_outputs};

use linfa_linalg::{qr::*, triangular::*};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use sabo_doe::cdist;
use std::fmt;

/// Coefficients of a fitted RBF interpolant.
#[derive(Debug, Clone)]
struct RbfCoefficients {
    /// Kernel weights, one per training point
    lambda: Array1<f64>,
    /// Polynomial tail coefficients
    tail: Array1<f64>,
}

/// A radial-basis-function interpolation model.
///
/// Predictions are a linear combination of the kernel evaluated at the
/// training points plus a low-order polynomial tail:
///
/// `s(x) = sum_i lambda_i * phi(|x - x_i|) + p(x)`
///
/// The weights `lambda` and the tail coefficients are the solution of the
/// saddle linear system
///
/// ```text
/// | Phi  P | |lambda|   |y|
/// | P^T  0 | |  c   | = |0|
/// ```
///
/// where `Phi[i][j] = phi(|x_i - x_j|)` and `P` is the polynomial basis
/// evaluated at the training points. The system is solved by QR
/// factorization; a vanishing diagonal in the triangular factor signals a
/// degenerate training set and fails with
/// [`ModelError::SingularFit`].
///
/// An optional [`OutputFilter`] is applied to the observed outputs before
/// each fit (the stored outputs stay raw), improving robustness against
/// noisy or failed evaluations.
#[derive(Debug)]
pub struct RbfModel {
    kernel: Box<dyn RadialBasisFunction>,
    filter: Box<dyn OutputFilter>,
    iindex: Vec<usize>,
    x: Array2<f64>,
    y: Array1<f64>,
    coefficients: Option<RbfCoefficients>,
}

impl Default for RbfModel {
    /// Cubic kernel with no output filtering.
    fn default() -> Self {
        RbfModel {
            kernel: Box::new(CubicRadialBasis),
            filter: Box::new(IdentityFilter),
            iindex: vec![],
            x: Array2::zeros((0, 0)),
            y: Array1::zeros(0),
            coefficients: None,
        }
    }
}

impl fmt::Display for RbfModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RBF(kernel={}, n={}, fitted={})",
            self.kernel.name(),
            self.x.nrows(),
            self.coefficients.is_some()
        )
    }
}

impl RbfModel {
    /// Constructor, defaults to a cubic kernel with no output filtering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the radial basis kernel.
    pub fn kernel(mut self, kernel: impl RadialBasisFunction + 'static) -> Self {
        self.kernel = Box::new(kernel);
        self
    }

    /// Sets the output filter applied before each fit.
    pub fn filter(mut self, filter: impl OutputFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Sets the indices of integral input coordinates.
    pub fn with_iindex(mut self, iindex: Vec<usize>) -> Self {
        self.iindex = iindex;
        self
    }

    /// Number of polynomial tail columns for a `dim`-dimensional input.
    fn ntail(&self, dim: usize) -> usize {
        match self.kernel.degree() {
            0 => 1,
            _ => dim + 1,
        }
    }

    /// Polynomial basis evaluated at the given points.
    fn tail_matrix(&self, x: &ArrayView2<f64>) -> Array2<f64> {
        let ones = Array2::ones((x.nrows(), 1));
        match self.kernel.degree() {
            0 => ones,
            _ => concatenate![Axis(1), ones, x.to_owned()],
        }
    }

    /// Solves the interpolation system for the given training set.
    fn fit(&self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<RbfCoefficients> {
        let n = x.nrows();
        let dim = x.ncols();
        let ntail = self.ntail(dim);
        let m = n + ntail;

        let yclean = sanitize_outputs(y).ok_or_else(|| {
            ModelError::InvalidValue("no finite output value in training set".to_string())
        })?;
        let yfit = self.filter.apply(&yclean.view());

        let phi = phi_matrix(self.kernel.as_ref(), &cdist(x, x));
        let p = self.tail_matrix(x);

        let mut a = Array2::zeros((m, m));
        a.slice_mut(s![..n, ..n]).assign(&phi);
        a.slice_mut(s![..n, n..]).assign(&p);
        a.slice_mut(s![n.., ..n]).assign(&p.t());

        let mut rhs = Array2::zeros((m, 1));
        rhs.slice_mut(s![..n, 0]).assign(&yfit);

        let (q, r) = a.qr()?.into_decomp();
        if is_degenerate(r.diag().iter().copied()) {
            return Err(ModelError::SingularFit(format!(
                "degenerate RBF system for {n} points in dimension {dim}"
            )));
        }
        let sol = r.solve_triangular_into(q.t().dot(&rhs), UPLO::Upper)?;
        let sol = sol.remove_axis(Axis(1));

        Ok(RbfCoefficients {
            lambda: sol.slice(s![..n]).to_owned(),
            tail: sol.slice(s![n..]).to_owned(),
        })
    }
}

impl Surrogate for RbfModel {
    fn xtrain(&self) -> ArrayView2<f64> {
        self.x.view()
    }

    fn ytrain(&self) -> ArrayView1<f64> {
        self.y.view()
    }

    fn iindex(&self) -> &[usize] {
        &self.iindex
    }

    fn update(&mut self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Ok(());
        }
        if x.nrows() != y.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "{} input points but {} output values",
                x.nrows(),
                y.len()
            )));
        }
        if self.x.nrows() > 0 && x.ncols() != self.x.ncols() {
            return Err(ModelError::ShapeMismatch(format!(
                "expected dimension {}, got {}",
                self.x.ncols(),
                x.ncols()
            )));
        }

        let xnew = if self.x.nrows() == 0 {
            x.to_owned()
        } else {
            concatenate![Axis(0), self.x, *x]
        };
        let ynew = concatenate![Axis(0), self.y, *y];

        // refit on the extended set before committing it, so a singular
        // addition leaves the model usable
        let coefficients = if xnew.nrows() >= self.ntail(xnew.ncols()) {
            Some(self.fit(&xnew.view(), &ynew.view())?)
        } else {
            None
        };

        self.x = xnew;
        self.y = ynew;
        self.coefficients = coefficients;
        Ok(())
    }

    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| {
            ModelError::NotFitted("RBF model has no interpolation coefficients".to_string())
        })?;
        let phi = phi_matrix(self.kernel.as_ref(), &cdist(x, &self.x));
        let p = self.tail_matrix(x);
        Ok(phi.dot(&coefficients.lambda) + p.dot(&coefficients.tail))
    }

    fn eval_kernel(&self, x: &ArrayView2<f64>, y: Option<&ArrayView2<f64>>) -> Result<Array2<f64>> {
        let r = match y {
            Some(y) => cdist(x, y),
            None => cdist(x, x),
        };
        Ok(phi_matrix(self.kernel.as_ref(), &r))
    }

    fn check_initial_design(&self, sample: &ArrayView2<f64>) -> bool {
        let dim = sample.ncols();
        if sample.nrows() < self.ntail(dim) {
            return false;
        }
        // a full-rank polynomial tail means enough affinely independent points
        let p = self.tail_matrix(sample);
        match p.qr() {
            Ok(qr) => {
                let (_, r) = qr.into_decomp();
                !is_degenerate(r.diag().iter().copied())
            }
            Err(_) => false,
        }
    }

    fn min_design_space_size(&self, dim: usize) -> usize {
        self.ntail(dim)
    }

    fn reset_data(&mut self) {
        self.x = Array2::zeros((0, 0));
        self.y = Array1::zeros(0);
        self.coefficients = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::MedianLpfFilter;
    use crate::kernels::{LinearRadialBasis, ThinPlateRadialBasis};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn quad(x: &ArrayView2<f64>) -> Array1<f64> {
        x.map_axis(Axis(1), |r| r.iter().map(|v| v * v).sum())
    }

    #[test]
    fn test_exact_interpolation_at_training_points() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.], [0.5, 0.3]];
        let yt = quad(&xt.view());

        for model in [
            RbfModel::new(),
            RbfModel::new().kernel(ThinPlateRadialBasis),
            RbfModel::new().kernel(LinearRadialBasis),
        ] {
            let mut model = model;
            model.update(&xt.view(), &yt.view()).expect("RBF fit");
            let pred = model.predict(&xt.view()).expect("RBF prediction");
            assert_abs_diff_eq!(pred, yt, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_empty_update_is_noop() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let yt = quad(&xt.view());
        let mut model = RbfModel::new();
        model.update(&xt.view(), &yt.view()).expect("RBF fit");

        let probe = array![[0.3, 0.7]];
        let before = model.predict(&probe.view()).unwrap();
        model
            .update(&Array2::zeros((0, 2)).view(), &Array1::zeros(0).view())
            .expect("empty update");
        let after = model.predict(&probe.view()).unwrap();
        assert_abs_diff_eq!(before, after, epsilon = f64::EPSILON);
        assert_eq!(model.ntrain(), 4);
    }

    #[test]
    fn test_eval_kernel_is_symmetric_with_zero_diagonal() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let yt = quad(&xt.view());
        let mut model = RbfModel::new();
        model.update(&xt.view(), &yt.view()).expect("RBF fit");

        let k = model.eval_kernel(&xt.view(), None).unwrap();
        assert_eq!(k.dim(), (4, 4));
        assert_abs_diff_eq!(k, k.t().to_owned(), epsilon = f64::EPSILON);
        assert_abs_diff_eq!(k.diag().to_owned(), Array1::zeros(4), epsilon = f64::EPSILON);

        // cubic kernel: phi(r) = r^3 of the pairwise distances
        let probe = array![[0., 0.]];
        let cross = model.eval_kernel(&probe.view(), Some(&xt.view())).unwrap();
        let expected = array![[0., 1., 1., 2_f64.sqrt().powi(3)]];
        assert_abs_diff_eq!(cross, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_duplicate_points_fail_singular() {
        let xt = array![[0., 0.], [1., 1.], [1., 1.], [0., 1.]];
        let yt = array![0., 1., 1., 2.];
        let mut model = RbfModel::new();
        let err = model.update(&xt.view(), &yt.view()).unwrap_err();
        assert!(matches!(err, ModelError::SingularFit(_)));
        // the failed update must not have committed the points
        assert_eq!(model.ntrain(), 0);
    }

    #[test]
    fn test_collinear_points_rejected_by_design_check() {
        let model = RbfModel::new();
        let collinear = array![[0., 0.], [1., 1.], [2., 2.], [3., 3.]];
        assert!(!model.check_initial_design(&collinear.view()));
        let spread = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        assert!(model.check_initial_design(&spread.view()));
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let model = RbfModel::new();
        let err = model.predict(&array![[0., 0.]].view()).unwrap_err();
        assert!(matches!(err, ModelError::NotFitted(_)));
    }

    #[test]
    fn test_median_filter_tames_outlier() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.], [0.5, 0.5]];
        let mut yt = quad(&xt.view());
        yt[4] = 1e9; // corrupted evaluation

        let mut filtered = RbfModel::new().filter(MedianLpfFilter);
        filtered.update(&xt.view(), &yt.view()).expect("RBF fit");
        let pred = filtered.predict(&array![[0.4, 0.6]].view()).unwrap();
        // the fit stays at the scale of the healthy outputs
        assert!(pred[0].abs() < 10.);
        // stored outputs stay raw
        assert_abs_diff_eq!(filtered.ytrain()[4], 1e9);
    }

    #[test]
    fn test_non_finite_outputs_do_not_corrupt_fit() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.], [0.5, 0.5]];
        let mut yt = quad(&xt.view());
        yt[2] = f64::NAN;
        let mut model = RbfModel::new();
        model.update(&xt.view(), &yt.view()).expect("RBF fit");
        let pred = model.predict(&array![[0.2, 0.2]].view()).unwrap();
        assert!(pred[0].is_finite());
    }

    #[test]
    fn test_min_design_space_size() {
        assert_eq!(RbfModel::new().min_design_space_size(3), 4);
        assert_eq!(
            RbfModel::new()
                .kernel(LinearRadialBasis)
                .min_design_space_size(3),
            1
        );
    }

    #[test]
    fn test_reset_data() {
        let xt = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let yt = quad(&xt.view());
        let mut model = RbfModel::new();
        model.update(&xt.view(), &yt.view()).expect("RBF fit");
        model.reset_data();
        assert_eq!(model.ntrain(), 0);
        assert!(model.predict(&array![[0.5, 0.5]].view()).is_err());
    }
}
