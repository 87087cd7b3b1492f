use crate::domain::Domain;
use crate::errors::{OptError, Result};
use crate::utils::{norm_cdf, norm_pdf};
use cobyla::{Func, RhoBeg, StopTols, minimize};
use ndarray::{Array1, Array2, ArrayView, ArrayView2};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use sabo_model::Surrogate;
use std::sync::{Arc, RwLock};

type RngRef<R> = Arc<RwLock<R>>;

/// Spread below which a candidate is treated as already known.
const SIGMA_TINY: f64 = 1e-12;
/// Budget of criterion evaluations per polish start.
const LOCAL_MAX_EVAL: usize = 100;

/// Expected improvement of a batch of points against the best observed
/// value, `s * (u * cdf(u) + pdf(u))` with `u = (f_min - mean) / s`.
/// Zero where the predictive spread vanishes.
pub fn expected_improvement(
    surrogate: &dyn Surrogate,
    x: &ArrayView2<f64>,
    f_min: f64,
) -> Result<Array1<f64>> {
    let (mean, spread) = surrogate.predict_valvar(x)?;
    Ok(Array1::from_iter(mean.iter().zip(spread.iter()).map(
        |(&mu, &s)| {
            if s < SIGMA_TINY {
                0.
            } else {
                let u = (f_min - mu) / s;
                ((f_min - mu) * norm_cdf(u) + s * norm_pdf(u)).max(0.)
            }
        },
    )))
}

/// Expected-improvement maximization over the box.
///
/// Screens a uniform candidate pool for promising starts, then polishes the
/// best of them with a continuous local search of the criterion. One point
/// per call, the usual pairing with the Gaussian-process model.
#[derive(Clone, Debug)]
pub struct MaximizeEi<R: Rng> {
    n_cand: Option<usize>,
    n_start: usize,
    rng: RngRef<R>,
}

impl MaximizeEi<Xoshiro256Plus> {
    /// Constructor with entropy-seeded randomness.
    pub fn new() -> Self {
        Self::new_with_rng(Xoshiro256Plus::from_entropy())
    }
}

impl Default for MaximizeEi<Xoshiro256Plus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MaximizeEi<R> {
    /// Constructor with the given random generator.
    pub fn new_with_rng(rng: R) -> Self {
        MaximizeEi {
            n_cand: None,
            n_start: 3,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the size of the screening pool. Defaults to `min(100 * dim, 5000)`.
    pub fn n_cand(mut self, n_cand: usize) -> Self {
        self.n_cand = Some(n_cand);
        self
    }

    /// Sets the number of polish starts.
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Returns the point of maximum expected improvement.
    pub fn optimize(
        &self,
        surrogate: &dyn Surrogate,
        domain: &Domain,
        f_min: f64,
    ) -> Result<Array1<f64>> {
        let nx = domain.dim();
        let n_cand = self.n_cand.unwrap_or((100 * nx).min(5000));
        if n_cand == 0 {
            return Err(OptError::Acquisition("empty screening pool".to_string()));
        }

        let mut pool = Array2::zeros((n_cand, nx));
        {
            let mut rng = self.rng.write().unwrap();
            for mut row in pool.rows_mut() {
                for (j, v) in row.iter_mut().enumerate() {
                    *v = rng.gen_range(domain.bounds()[[j, 0]]..domain.bounds()[[j, 1]]);
                }
            }
        }
        domain.round_integral(&mut pool.view_mut());
        let ei = expected_improvement(surrogate, &pool.view(), f_min)?;

        // best screened candidates seed the continuous polish
        let mut order: Vec<usize> = (0..n_cand).collect();
        order.sort_by(|&a, &b| ei[b].total_cmp(&ei[a]));

        let objfn = |x: &[f64], _u: &mut ()| -> f64 {
            let pt = ArrayView::from_shape((1, nx), x).unwrap();
            match expected_improvement(surrogate, &pt, f_min) {
                Ok(v) => -v[0],
                Err(_) => f64::INFINITY,
            }
        };
        let cons: Vec<&dyn Func<()>> = vec![];
        let bounds = domain.as_pairs();
        let rhobeg = domain.span().iter().copied().fold(f64::INFINITY, f64::min) * 0.1;

        let argmax = ei.argmax().map_err(|e| {
            OptError::Acquisition(format!("no usable expected improvement value: {e}"))
        })?;
        let mut best = (-ei[argmax], pool.row(argmax).to_vec());
        for &i in order.iter().take(self.n_start) {
            let x0 = pool.row(i).to_vec();
            if let Ok((_, x_opt, fval)) = minimize(
                |x, u| objfn(x, u),
                &x0,
                &bounds,
                &cons,
                (),
                LOCAL_MAX_EVAL,
                RhoBeg::All(rhobeg),
                Some(StopTols {
                    ftol_rel: 1e-6,
                    ..StopTols::default()
                }),
            ) {
                if fval < best.0 {
                    best = (fval, x_opt);
                }
            }
        }

        let mut x = Array2::from_shape_vec((1, nx), best.1)
            .map_err(|e| OptError::Acquisition(e.to_string()))?;
        domain.clip(&mut x.view_mut());
        domain.round_integral(&mut x.view_mut());
        Ok(x.row(0).to_owned())
    }
}
