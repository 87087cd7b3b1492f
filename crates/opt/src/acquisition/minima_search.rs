use crate::domain::Domain;
use crate::errors::Result;
use cobyla::{Func, RhoBeg, StopTols, minimize};
use log::debug;
use ndarray::{Array2, ArrayView};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use sabo_doe::{SamplingMethod, Slhd, cdist};
use sabo_model::Surrogate;
use std::sync::{Arc, RwLock};

type RngRef<R> = Arc<RwLock<R>>;

/// Default separation radius as a fraction of the box diagonal.
pub const DEFAULT_SEPARATION: f64 = 0.007071067811865475;
/// Budget of surrogate predictions per local start.
const LOCAL_MAX_EVAL: usize = 100;

/// Multistart search for diverse local minima of the surrogate landscape.
///
/// Runs independent local minimizations of the surrogate prediction from
/// space-filling start points, then keeps the minima that are separated from
/// each other and from every already-evaluated point by a minimum radius.
/// Minima falling inside a basin that has already been sampled are dropped,
/// which steers the sampling toward unexplored basins.
#[derive(Clone, Debug)]
pub struct MinimaSearch<R: Rng> {
    n_start: usize,
    separation: f64,
    rng: RngRef<R>,
}

impl MinimaSearch<Xoshiro256Plus> {
    /// Constructor with entropy-seeded randomness.
    pub fn new() -> Self {
        Self::new_with_rng(Xoshiro256Plus::from_entropy())
    }
}

impl Default for MinimaSearch<Xoshiro256Plus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MinimaSearch<R> {
    /// Constructor with the given random generator.
    pub fn new_with_rng(rng: R) -> Self {
        MinimaSearch {
            n_start: 10,
            separation: DEFAULT_SEPARATION,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the number of local starts.
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start;
        self
    }

    /// Sets the separation radius, as a fraction of the box diagonal.
    pub fn separation(mut self, separation: f64) -> Self {
        self.separation = separation;
        self
    }

    /// Returns up to `n` surrogate minima as a `(k, dim)` array, `k <= n`.
    ///
    /// May return an empty array when every discovered minimum lies within
    /// the separation radius of an evaluated point; the caller is expected
    /// to fall back to another acquisition in that case.
    pub fn optimize(
        &self,
        surrogate: &dyn Surrogate,
        domain: &Domain,
        n: usize,
    ) -> Result<Array2<f64>> {
        let nx = domain.dim();
        let bounds = domain.as_pairs();
        let radius = self.separation * domain.diameter();

        let seed = self.rng.write().unwrap().gen::<u64>();
        let starts = Slhd::new_with_rng(domain.bounds(), Xoshiro256Plus::seed_from_u64(seed))
            .sample(self.n_start);

        let objfn = |x: &[f64], _u: &mut ()| -> f64 {
            let pt = ArrayView::from_shape((1, nx), x).unwrap();
            match surrogate.predict(&pt) {
                Ok(y) => y[0],
                Err(_) => f64::INFINITY,
            }
        };
        let cons: Vec<&dyn Func<()>> = vec![];

        let rhobeg = domain.span().iter().copied().fold(f64::INFINITY, f64::min) * 0.1;
        let mut minima: Vec<(Vec<f64>, f64)> = vec![];
        for start in starts.rows() {
            let x0 = start.to_vec();
            let res = minimize(
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
            );
            if let Ok((_, x_opt, fval)) = res {
                if fval.is_finite() {
                    minima.push((x_opt, fval));
                }
            }
        }
        minima.sort_by(|a, b| a.1.total_cmp(&b.1));

        // best minima first, kept only when separated from every evaluated
        // point and every minimum already kept
        let mut kept: Vec<f64> = vec![];
        let mut n_kept = 0;
        for (x_opt, _) in minima {
            if n_kept == n {
                break;
            }
            let mut x = Array2::from_shape_vec((1, nx), x_opt).unwrap();
            domain.clip(&mut x.view_mut());
            domain.round_integral(&mut x.view_mut());

            let xt = surrogate.xtrain();
            let near_train = xt.nrows() > 0
                && cdist(&x, &xt).iter().any(|&d| d < radius);
            if near_train {
                continue;
            }
            if n_kept > 0 {
                let prev = ArrayView::from_shape((n_kept, nx), kept.as_slice()).unwrap();
                if cdist(&x, &prev).iter().any(|&d| d < radius) {
                    continue;
                }
            }
            kept.extend(x.iter());
            n_kept += 1;
        }
        debug!("minima search kept {n_kept} of {} starts", self.n_start);
        Ok(Array2::from_shape_vec((n_kept, nx), kept).unwrap())
    }
}
