use crate::correlation::{CorrelationKernel, SquaredExponentialCorr};
use crate::errors::{ModelError, Result};
use crate::surrogate::Surrogate;
use crate::utils::sanitize_outputs;

use cobyla::{Func, RhoBeg, StopTols, minimize};
use linfa_linalg::{cholesky::*, triangular::*};
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use sabo_doe::{SamplingMethod, Slhd, pdist};
use std::fmt;

/// Nugget added to the correlation diagonal to improve conditioning
const NUGGET: f64 = 100.0 * f64::EPSILON;
/// Default inverse length scale used to seed hyperparameter tuning
const THETA_INIT: f64 = 1e-2;
/// Hyperparameter search interval (log10 bounds)
const THETA_LOG10_BOUNDS: (f64, f64) = (-6., 1.301029995663981);
/// Default number of restarts for hyperparameter tuning
const TUNING_N_START: usize = 5;
/// Maximum number of likelihood evaluations per tuning restart
const TUNING_MAX_EVAL: usize = 50;

/// Fitted state of the Gaussian process, recomputed at each update.
#[derive(Debug, Clone)]
struct GpInner {
    /// Per-column mean/std of the training inputs
    x_mean: Array1<f64>,
    x_std: Array1<f64>,
    /// Output normalization (0/1 when `normalize_y` is off)
    y_mean: f64,
    y_std: f64,
    /// Normalized training inputs
    xnorm: Array2<f64>,
    /// Tuned inverse length scales
    theta: Array1<f64>,
    /// Process variance
    sigma2: f64,
    /// Constant mean coefficient
    beta: f64,
    /// Cholesky factor (lower) of the correlation matrix
    r_chol: Array2<f64>,
    /// `L^-1 * ones`, kept for the variance computation
    ft: Array2<f64>,
    /// Kriging weights `R^-1 (y - beta)`
    gamma: Array1<f64>,
    /// Reduced likelihood reached by the tuning
    likelihood: f64,
}

/// An ordinary kriging regressor: a Gaussian process with constant mean and
/// a stationary correlation kernel.
///
/// The interpolated output is modeled as `Y(x) = beta + Z(x)` where `Z` is a
/// zero-mean Gaussian process of variance `sigma^2` and correlation
/// `k(x, x'; theta)`. The inverse length scales `theta` are selected at each
/// [`Surrogate::update`] by maximizing the reduced likelihood with a
/// multistart COBYLA search over `log10(theta)`.
///
/// Predictions expose both the mean estimate and the predictive standard
/// deviation through [`Surrogate::predict_valvar`], which the
/// expected-improvement acquisition requires.
#[derive(Debug)]
pub struct GaussianProcess {
    corr: Box<dyn CorrelationKernel>,
    normalize_y: bool,
    n_start: usize,
    iindex: Vec<usize>,
    x: Array2<f64>,
    y: Array1<f64>,
    inner: Option<GpInner>,
}

impl Default for GaussianProcess {
    fn default() -> Self {
        GaussianProcess {
            corr: Box::new(SquaredExponentialCorr),
            normalize_y: false,
            n_start: TUNING_N_START,
            iindex: vec![],
            x: Array2::zeros((0, 0)),
            y: Array1::zeros(0),
            inner: None,
        }
    }
}

impl fmt::Display for GaussianProcess {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.inner {
            Some(inner) => write!(
                f,
                "GP(corr={}, n={}, theta={}, variance={}, likelihood={})",
                self.corr.name(),
                self.x.nrows(),
                inner.theta,
                inner.sigma2,
                inner.likelihood
            ),
            None => write!(f, "GP(corr={}, unfitted)", self.corr.name()),
        }
    }
}

/// Correlation matrix between rows of `xa` and rows of `xb`.
fn corr_cross(
    corr: &dyn CorrelationKernel,
    xa: &ArrayView2<f64>,
    xb: &ArrayView2<f64>,
    theta: &ArrayView1<f64>,
) -> Array2<f64> {
    let mut k = Array2::zeros((xa.nrows(), xb.nrows()));
    for (i, a) in xa.rows().into_iter().enumerate() {
        for (j, b) in xb.rows().into_iter().enumerate() {
            let d = (&a - &b).mapv(f64::abs);
            k[[i, j]] = corr.value(&d.view(), theta);
        }
    }
    k
}

/// Core of a kriging fit for a fixed `theta`: correlation Cholesky,
/// generalized least squares for the constant mean and the process variance,
/// and the reduced likelihood used for hyperparameter selection.
fn fit_with_theta(
    corr: &dyn CorrelationKernel,
    xnorm: &ArrayView2<f64>,
    ynorm: &ArrayView1<f64>,
    theta: &ArrayView1<f64>,
) -> Result<(f64, f64, Array2<f64>, Array2<f64>, Array1<f64>, f64)> {
    let n = xnorm.nrows();

    let mut r_mx = corr_cross(corr, xnorm, xnorm, theta);
    for i in 0..n {
        r_mx[[i, i]] += NUGGET;
    }

    let r_chol = r_mx
        .cholesky()
        .map_err(|e| ModelError::SingularFit(format!("GP correlation matrix: {e}")))?;

    let ones = Array2::ones((n, 1));
    let ft = r_chol.solve_triangular(&ones, UPLO::Lower)?;
    let yt = r_chol.solve_triangular(&ynorm.to_owned().insert_axis(Axis(1)), UPLO::Lower)?;

    let ftf: f64 = ft.iter().map(|v| v * v).sum();
    let beta = ft.t().dot(&yt)[[0, 0]] / ftf;
    let rho = &yt - &ft.mapv(|v| v * beta);
    let sigma2 = (rho.iter().map(|v| v * v).sum::<f64>() / n as f64).max(f64::MIN_POSITIVE);
    let gamma = r_chol
        .t()
        .solve_triangular_into(rho, UPLO::Upper)?
        .remove_axis(Axis(1));

    let logdet: f64 = 2. * r_chol.diag().iter().map(|v| v.ln()).sum::<f64>();
    let likelihood = -(n as f64 * sigma2.ln() + logdet);

    Ok((beta, sigma2, r_chol, ft, gamma, likelihood))
}

impl GaussianProcess {
    /// Constructor, defaults to a squared exponential kernel without output
    /// normalization.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correlation kernel.
    pub fn corr(mut self, corr: impl CorrelationKernel + 'static) -> Self {
        self.corr = Box::new(corr);
        self
    }

    /// Enables zero-mean/unit-variance normalization of the observed
    /// outputs, improving numerical stability when outputs are large.
    pub fn normalize_y(mut self, normalize_y: bool) -> Self {
        self.normalize_y = normalize_y;
        self
    }

    /// Sets the number of restarts of the hyperparameter tuning.
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Sets the indices of integral input coordinates.
    pub fn with_iindex(mut self, iindex: Vec<usize>) -> Self {
        self.iindex = iindex;
        self
    }

    /// Tuned inverse length scales, available once fitted.
    pub fn theta(&self) -> Option<ArrayView1<f64>> {
        self.inner.as_ref().map(|inner| inner.theta.view())
    }

    /// Selects `theta` by maximizing the reduced likelihood, multistart
    /// COBYLA over `log10(theta)`.
    fn tune_theta(&self, xnorm: &ArrayView2<f64>, ynorm: &ArrayView1<f64>) -> Array1<f64> {
        let nx = xnorm.ncols();
        let (lo, up) = THETA_LOG10_BOUNDS;
        let bounds = vec![(lo, up); nx];

        let theta0 = match &self.inner {
            Some(inner) if inner.theta.len() == nx => inner.theta.mapv(f64::log10),
            _ => Array1::from_elem(nx, THETA_INIT.log10()),
        };

        // restart points spread over the log10 search box; seeded, the
        // spread only needs to be space-filling
        let xlimits = Array2::from_shape_fn((nx, 2), |(_, j)| if j == 0 { lo } else { up });
        let starts = Slhd::new_with_rng(&xlimits, Xoshiro256Plus::seed_from_u64(42))
            .sample(self.n_start.max(1));

        let objfn = |log10t: &[f64], _u: &mut ()| -> f64 {
            let theta = Array1::from_iter(log10t.iter().map(|v| 10f64.powf(*v)));
            match fit_with_theta(self.corr.as_ref(), xnorm, ynorm, &theta.view()) {
                Ok((.., likelihood)) => -likelihood,
                Err(_) => f64::INFINITY,
            }
        };

        let cons: Vec<&dyn Func<()>> = vec![];
        let mut best = (f64::INFINITY, theta0.to_vec());
        for start in std::iter::once(theta0.view()).chain(starts.rows()) {
            let x0 = start.to_vec();
            match minimize(
                |x, u| objfn(x, u),
                &x0,
                &bounds,
                &cons,
                (),
                TUNING_MAX_EVAL,
                RhoBeg::All(0.5),
                Some(StopTols {
                    ftol_rel: 1e-4,
                    ..StopTols::default()
                }),
            ) {
                Ok((_, x_opt, fval)) => {
                    if fval < best.0 {
                        best = (fval, x_opt);
                    }
                }
                Err((status, _, _)) => {
                    warn!("GP hyperparameter tuning restart failed: {status:?}");
                }
            }
        }
        debug!("GP theta tuning: best neg likelihood {}", best.0);
        Array1::from_iter(best.1.iter().map(|v| 10f64.powf(*v)))
    }

    /// Full refit: normalization, hyperparameter tuning, kriging solve.
    fn fit(&self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> Result<GpInner> {
        let yclean = sanitize_outputs(y).ok_or_else(|| {
            ModelError::InvalidValue("no finite output value in training set".to_string())
        })?;
        // the nugget keeps the factorization alive even for coincident
        // points, so duplicates have to be rejected explicitly
        if pdist(x).iter().any(|&d| d == 0.) {
            return Err(ModelError::SingularFit(
                "duplicate training points".to_string(),
            ));
        }

        let x_mean = x.mean_axis(Axis(0)).unwrap();
        let mut x_std = x.std_axis(Axis(0), 1.);
        x_std.mapv_inplace(|v| if v == 0. { 1. } else { v });
        let xnorm = (x - &x_mean) / &x_std;

        let (y_mean, y_std) = if self.normalize_y {
            let mean = yclean.mean().unwrap();
            let std = yclean.std(1.);
            (mean, if std == 0. { 1. } else { std })
        } else {
            (0., 1.)
        };
        let ynorm = yclean.mapv(|v| (v - y_mean) / y_std);

        let theta = self.tune_theta(&xnorm.view(), &ynorm.view());
        let (beta, sigma2, r_chol, ft, gamma, likelihood) =
            fit_with_theta(self.corr.as_ref(), &xnorm.view(), &ynorm.view(), &theta.view())?;

        Ok(GpInner {
            x_mean,
            x_std,
            y_mean,
            y_std,
            xnorm,
            theta,
            sigma2,
            beta,
            r_chol,
            ft,
            gamma,
            likelihood,
        })
    }
}

impl Surrogate for GaussianProcess {
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

        let inner = if xnew.nrows() >= self.min_design_space_size(xnew.ncols()) {
            Some(self.fit(&xnew.view(), &ynew.view())?)
        } else {
            None
        };

        self.x = xnew;
        self.y = ynew;
        self.inner = inner;
        Ok(())
    }

    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted("GP has no trained state".to_string()))?;
        let xnorm = (x - &inner.x_mean) / &inner.x_std;
        let k = corr_cross(
            self.corr.as_ref(),
            &xnorm.view(),
            &inner.xnorm.view(),
            &inner.theta.view(),
        );
        let y_ = k.dot(&inner.gamma) + inner.beta;
        Ok(y_.mapv(|v| v * inner.y_std + inner.y_mean))
    }

    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted("GP has no trained state".to_string()))?;
        let xnorm = (x - &inner.x_mean) / &inner.x_std;
        let k = corr_cross(
            self.corr.as_ref(),
            &xnorm.view(),
            &inner.xnorm.view(),
            &inner.theta.view(),
        );
        let values = (k.dot(&inner.gamma) + inner.beta).mapv(|v| v * inner.y_std + inner.y_mean);

        // ordinary kriging variance:
        // sigma2 * (1 - rt'rt + (1 - ft'rt)^2 / ft'ft)
        let rt = inner.r_chol.solve_triangular(&k.t().to_owned(), UPLO::Lower)?;
        let ftf: f64 = inner.ft.iter().map(|v| v * v).sum();
        let ft_col = inner.ft.column(0);
        let mut std_dev = Array1::zeros(x.nrows());
        for (i, rt_col) in rt.columns().into_iter().enumerate() {
            let rtr: f64 = rt_col.iter().map(|v| v * v).sum();
            let u = 1. - ft_col.dot(&rt_col);
            let mse = inner.sigma2 * (1. - rtr + u * u / ftf);
            // slightly negative values happen at machine precision
            std_dev[i] = mse.max(0.).sqrt() * inner.y_std;
        }
        Ok((values, std_dev))
    }

    fn eval_kernel(&self, x: &ArrayView2<f64>, y: Option<&ArrayView2<f64>>) -> Result<Array2<f64>> {
        let (theta, normalizer) = match &self.inner {
            Some(inner) => (
                inner.theta.to_owned(),
                Some((inner.x_mean.to_owned(), inner.x_std.to_owned())),
            ),
            None => (Array1::from_elem(x.ncols(), THETA_INIT), None),
        };
        let scale = |a: &ArrayView2<f64>| match &normalizer {
            Some((mean, std)) => (a - mean) / std,
            None => a.to_owned(),
        };
        let xa = scale(x);
        let xb = match y {
            Some(y) => scale(y),
            None => xa.to_owned(),
        };
        Ok(corr_cross(
            self.corr.as_ref(),
            &xa.view(),
            &xb.view(),
            &theta.view(),
        ))
    }

    fn check_initial_design(&self, sample: &ArrayView2<f64>) -> bool {
        if sample.nrows() < self.min_design_space_size(sample.ncols()) {
            return false;
        }
        // duplicate points make the correlation matrix singular
        pdist(sample).iter().all(|&d| d > 0.)
    }

    fn min_design_space_size(&self, dim: usize) -> usize {
        dim + 1
    }

    fn reset_data(&mut self) {
        self.x = Array2::zeros((0, 0));
        self.y = Array1::zeros(0);
        self.inner = None;
    }
}
