use crate::domain::Domain;
use crate::errors::{OptError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256Plus;
use sabo_doe::cdist;
use sabo_model::Surrogate;
use std::sync::{Arc, RwLock};

type RngRef<R> = Arc<RwLock<R>>;

/// Default fraction of each dimension's span used as perturbation spread.
pub const DEFAULT_SIGMA: f64 = 0.2;
/// Default evaluability acceptance threshold.
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.5;
/// Cap on the size of the candidate pool.
const MAX_CANDIDATES: usize = 5000;

/// General-purpose candidate acquisition.
///
/// One `optimize` call runs two phases. The generation phase produces
/// `2 * n_cand` candidates: half by perturbing randomly drawn evaluated
/// points coordinate by coordinate, half uniformly over the box. The
/// selection phase scores every candidate by a weighted blend of its
/// predicted objective value and its distance to the training set, then
/// keeps the `n` best.
///
/// An optional evaluability surrogate acts as a hard filter before scoring:
/// candidates predicted below the acceptance threshold are discarded and can
/// never be selected, whatever their score.
#[derive(Clone, Debug)]
pub struct CycleSearch<R: Rng> {
    n_cand: Option<usize>,
    perturb_prob: f64,
    sigma: f64,
    accept_threshold: f64,
    rng: RngRef<R>,
}

impl CycleSearch<Xoshiro256Plus> {
    /// Constructor with entropy-seeded randomness.
    pub fn new() -> Self {
        Self::new_with_rng(Xoshiro256Plus::from_entropy())
    }
}

impl Default for CycleSearch<Xoshiro256Plus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CycleSearch<R> {
    /// Constructor with the given random generator.
    pub fn new_with_rng(rng: R) -> Self {
        CycleSearch {
            n_cand: None,
            perturb_prob: 1.,
            sigma: DEFAULT_SIGMA,
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the random generator.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> CycleSearch<R2> {
        CycleSearch {
            n_cand: self.n_cand,
            perturb_prob: self.perturb_prob,
            sigma: self.sigma,
            accept_threshold: self.accept_threshold,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the number of candidates per pool half.
    /// Defaults to `min(100 * dim, 5000)`.
    pub fn n_cand(mut self, n_cand: usize) -> Self {
        self.n_cand = Some(n_cand);
        self
    }

    /// Sets the evaluability acceptance threshold.
    pub fn accept_threshold(mut self, threshold: f64) -> Self {
        self.accept_threshold = threshold;
        self
    }

    /// Current perturbation spread, as a fraction of each dimension's span.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Sets the perturbation spread.
    pub fn set_sigma(&mut self, sigma: f64) {
        self.sigma = sigma;
    }

    /// Current probability of perturbing each coordinate.
    pub fn perturb_prob(&self) -> f64 {
        self.perturb_prob
    }

    /// Sets the per-coordinate perturbation probability.
    pub fn set_perturb_prob(&mut self, perturb_prob: f64) {
        self.perturb_prob = perturb_prob;
    }

    /// Produces `2 * n_cand` candidates: `n_cand` local perturbations of
    /// randomly drawn evaluated points and `n_cand` uniform points, all
    /// clipped to the box with integral coordinates rounded.
    pub fn generate_candidates(
        &self,
        surrogate: &dyn Surrogate,
        domain: &Domain,
        n_cand: usize,
    ) -> Array2<f64> {
        let nx = domain.dim();
        let span = domain.span();
        let xt = surrogate.xtrain();
        let mut cand = Array2::zeros((2 * n_cand, nx));

        {
            let mut rng = self.rng.write().unwrap();
            for mut row in cand.slice_mut(s![..n_cand, ..]).rows_mut() {
                if xt.nrows() == 0 {
                    for (j, v) in row.iter_mut().enumerate() {
                        *v = rng.gen_range(domain.bounds()[[j, 0]]..domain.bounds()[[j, 1]]);
                    }
                    continue;
                }
                row.assign(&xt.row(rng.gen_range(0..xt.nrows())));
                // at least one coordinate always moves, otherwise the
                // candidate duplicates a training point
                let forced = rng.gen_range(0..nx);
                for j in 0..nx {
                    if j == forced || rng.gen::<f64>() < self.perturb_prob {
                        let eps: f64 = rng.sample(StandardNormal);
                        row[j] += self.sigma * span[j] * eps;
                    }
                }
            }
            for mut row in cand.slice_mut(s![n_cand.., ..]).rows_mut() {
                for (j, v) in row.iter_mut().enumerate() {
                    *v = rng.gen_range(domain.bounds()[[j, 0]]..domain.bounds()[[j, 1]]);
                }
            }
        }

        domain.clip(&mut cand.view_mut());
        domain.round_integral(&mut cand.view_mut());
        cand
    }

    /// Scores the candidates and returns the `n` best as a `(n, dim)` array.
    ///
    /// Composite score per candidate is
    /// `w * dist_n + (1 - w) * (1 - val_n)` where `dist_n` is the min-max
    /// normalized distance to the nearest training point and `val_n` the
    /// normalized predicted value; higher is better. Exact score ties are
    /// broken by larger distance, then by lower predicted value.
    pub fn select_candidates(
        &self,
        surrogate: &dyn Surrogate,
        candidates: &ArrayView2<f64>,
        n: usize,
        score_weight: f64,
        evaluability: Option<&dyn Surrogate>,
    ) -> Result<Array2<f64>> {
        let keep: Vec<usize> = match evaluability {
            Some(model) => {
                let scores = model.predict(candidates)?;
                (0..candidates.nrows())
                    .filter(|&i| scores[i] >= self.accept_threshold)
                    .collect()
            }
            None => (0..candidates.nrows()).collect(),
        };
        if keep.len() < n {
            return Err(OptError::Acquisition(format!(
                "{} candidates survive the evaluability filter, {} requested",
                keep.len(),
                n
            )));
        }
        let survivors = candidates.select(Axis(0), &keep);

        let values = surrogate.predict(&survivors.view())?;
        let dists = cdist(&survivors, &surrogate.xtrain())
            .map_axis(Axis(1), |row| row.iter().copied().fold(f64::INFINITY, f64::min));
        let val_n = minmax_normalize(&values);
        let dist_n = minmax_normalize(&dists);

        let score: Array1<f64> = (0..survivors.nrows())
            .map(|i| score_weight * dist_n[i] + (1. - score_weight) * (1. - val_n[i]))
            .collect();

        let mut order: Vec<usize> = (0..survivors.nrows()).collect();
        order.sort_by(|&a, &b| {
            score[b]
                .total_cmp(&score[a])
                .then(dist_n[b].total_cmp(&dist_n[a]))
                .then(val_n[a].total_cmp(&val_n[b]))
        });
        Ok(survivors.select(Axis(0), &order[..n]))
    }

    /// Chains candidate generation and selection, returning `n` points.
    pub fn optimize(
        &self,
        surrogate: &dyn Surrogate,
        domain: &Domain,
        n: usize,
        score_weight: f64,
        evaluability: Option<&dyn Surrogate>,
    ) -> Result<Array2<f64>> {
        let n_cand = self
            .n_cand
            .unwrap_or((100 * domain.dim()).min(MAX_CANDIDATES))
            .max(n);
        let candidates = self.generate_candidates(surrogate, domain, n_cand);
        self.select_candidates(surrogate, &candidates.view(), n, score_weight, evaluability)
    }
}

/// Min-max scaling to the unit interval; a zero-range signal maps to the
/// constant 0.5 so it cannot dominate the composite score.
fn minmax_normalize(v: &Array1<f64>) -> Array1<f64> {
    let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if range > 0. && range.is_finite() {
        v.mapv(|x| (x - lo) / range)
    } else {
        Array1::from_elem(v.len(), 0.5)
    }
}
