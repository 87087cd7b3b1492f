use crate::acquisition::{CycleSearch, DEFAULT_SIGMA, MaximizeEi, MinimaSearch};
use crate::domain::Domain;
use crate::errors::{OptError, Result};
use crate::solver::config::{
    Algorithm, OptConfig, SIGMA_MIN_FACTOR, SUCCESS_TOL, WEIGHT_CYCLE, failure_tol,
};
use crate::types::{ObjFunc, OptimResult};
use cobyla::{Func, RhoBeg, StopTols, minimize as local_minimize};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView, Axis, s};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use sabo_doe::{SamplingMethod, Slhd};
use sabo_model::{ModelError, Surrogate};
use std::cell::RefCell;
use std::time::Instant;

/// Relative tolerance for counting an iteration as an improvement.
const IMPROVEMENT_RTOL: f64 = 1e-6;
/// Points requested per clustering-search round.
const MLSL_BATCH: usize = 5;
/// Attempts at drawing a well-posed initial design.
const DESIGN_ATTEMPTS: usize = 5;

/// Runs one optimization of `objf` over `domain` under `config`.
///
/// The objective is called on batches of points and may return non-finite
/// values; those are recorded in the history as-is and never picked as the
/// optimum. The run consumes at most `max_eval` objective evaluations,
/// including the initial design.
pub fn minimize<O: ObjFunc>(
    objf: &O,
    domain: &Domain,
    config: &OptConfig,
) -> Result<OptimResult> {
    config.validate()?;
    Run::new(objf, domain, config.clone()).run()
}

/// Runs `n_runs` independent repetitions seeded `0..n_runs`, in parallel.
///
/// Each run builds its own model and acquisition state from the immutable
/// configuration, so runs share nothing mutable.
pub fn run_batch<O: ObjFunc>(
    objf: &O,
    domain: &Domain,
    config: &OptConfig,
    n_runs: usize,
) -> Result<Vec<OptimResult>> {
    (0..n_runs as u64)
        .into_par_iter()
        .map(|seed| minimize(objf, domain, &config.clone().seed(seed)))
        .collect()
}

/// Phases of the coordinate-perturbation / target-value alternation.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Perturb,
    Global,
}

/// State of one run: the model, the acquisition strategies, the evaluation
/// history and the remaining budget.
struct Run<'a, O: ObjFunc> {
    objf: &'a O,
    domain: &'a Domain,
    config: OptConfig,
    model: Box<dyn Surrogate>,
    search: CycleSearch<Xoshiro256Plus>,
    minima: MinimaSearch<Xoshiro256Plus>,
    ei: MaximizeEi<Xoshiro256Plus>,
    rng: Xoshiro256Plus,
    x_hist: Vec<f64>,
    y_hist: Vec<f64>,
    n_eval: usize,
}

impl<'a, O: ObjFunc> Run<'a, O> {
    fn new(objf: &'a O, domain: &'a Domain, config: OptConfig) -> Self {
        let spec = config
            .model
            .unwrap_or_else(|| config.algorithm.default_model());
        let model = spec.build(domain.iindex().to_vec());
        let mut rng = Xoshiro256Plus::seed_from_u64(config.seed);
        let search = CycleSearch::new_with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
        let minima = MinimaSearch::new_with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
        let ei = MaximizeEi::new_with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
        Run {
            objf,
            domain,
            config,
            model,
            search,
            minima,
            ei,
            rng,
            x_hist: vec![],
            y_hist: vec![],
            n_eval: 0,
        }
    }

    fn budget_left(&self) -> usize {
        self.config.max_eval - self.n_eval
    }

    fn target_reached(&self) -> bool {
        self.config.target.is_some_and(|t| self.best_value() <= t)
    }

    fn best_value(&self) -> f64 {
        self.y_hist
            .iter()
            .copied()
            .filter(|y| y.is_finite())
            .fold(f64::INFINITY, f64::min)
    }

    fn best_point(&self) -> Option<Array1<f64>> {
        let nx = self.domain.dim();
        self.y_hist
            .iter()
            .enumerate()
            .filter(|(_, y)| y.is_finite())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| Array1::from_iter(self.x_hist[i * nx..(i + 1) * nx].iter().copied()))
    }

    fn push_history(&mut self, x: &Array2<f64>, y: &Array1<f64>) {
        self.x_hist.extend(x.iter());
        self.y_hist.extend(y.iter());
        self.n_eval += y.len();
    }

    fn evaluate(&mut self, x: &Array2<f64>) -> Array1<f64> {
        let y = (self.objf)(&x.view());
        self.push_history(x, &y);
        y
    }

    /// Feeds freshly evaluated points to the model. A singular fit is
    /// retried once with slightly perturbed inputs; a second failure skips
    /// the points with a warning.
    fn feed_model(&mut self, x: &Array2<f64>, y: &Array1<f64>) {
        match self.model.update(&x.view(), &y.view()) {
            Ok(()) => {}
            Err(ModelError::SingularFit(msg)) => {
                debug!("singular fit ({msg}), retrying with perturbed inputs");
                let span = self.domain.span();
                let mut xp = x.clone();
                for mut row in xp.rows_mut() {
                    for (j, v) in row.iter_mut().enumerate() {
                        let eps: f64 = self.rng.sample(StandardNormal);
                        *v += 1e-6 * span[j] * eps;
                    }
                }
                self.domain.clip(&mut xp.view_mut());
                if let Err(err) = self.model.update(&xp.view(), &y.view()) {
                    warn!("surrogate update skipped {} points: {err}", x.nrows());
                }
            }
            Err(err) => warn!("surrogate update skipped {} points: {err}", x.nrows()),
        }
    }

    /// Draws, evaluates and fits the space-filling initial design of size
    /// `2 * (dim + 1)`, clamped to the remaining budget.
    fn initial_design(&mut self) -> Result<()> {
        let dim = self.domain.dim();
        let min_size = self.model.min_design_space_size(dim);
        let n_init = (2 * (dim + 1)).min(self.budget_left());
        if n_init < min_size {
            return Err(OptError::InsufficientDesign(format!(
                "budget funds {n_init} design points, the model needs {min_size}"
            )));
        }

        let mut design = Array2::zeros((0, dim));
        for attempt in 0..DESIGN_ATTEMPTS {
            let seed = self.rng.gen::<u64>();
            let mut doe = Slhd::new_with_rng(self.domain.bounds(), Xoshiro256Plus::seed_from_u64(seed))
                .sample(n_init);
            self.domain.round_integral(&mut doe.view_mut());
            let ok = self.model.check_initial_design(&doe.view());
            design = doe;
            if ok {
                break;
            }
            debug!("initial design rejected, redrawing (attempt {attempt})");
            if attempt + 1 == DESIGN_ATTEMPTS {
                warn!("no well-posed initial design after {DESIGN_ATTEMPTS} draws, keeping the last one");
            }
        }

        let y = self.evaluate(&design);
        self.feed_model(&design, &y);
        Ok(())
    }

    /// Local refinement of the incumbent against the true objective; every
    /// evaluation it spends is recorded in the history and fed to the model.
    fn polish(&mut self) -> Result<()> {
        let Some(x0) = self.best_point() else {
            return Ok(());
        };
        let nx = self.domain.dim();
        let budget = self.budget_left().min(10 * nx + 10);
        if budget == 0 {
            return Ok(());
        }

        let trace: RefCell<(Vec<f64>, Vec<f64>)> = RefCell::new((vec![], vec![]));
        let objf = self.objf;
        let f = |x: &[f64], _u: &mut ()| -> f64 {
            let pt = ArrayView::from_shape((1, nx), x).unwrap();
            let y = objf(&pt)[0];
            let mut t = trace.borrow_mut();
            t.0.extend_from_slice(x);
            t.1.push(y);
            y
        };
        let cons: Vec<&dyn Func<()>> = vec![];
        let bounds = self.domain.as_pairs();
        let rhobeg = 0.1 * self.domain.span().iter().copied().fold(f64::INFINITY, f64::min);
        if let Err((status, _, _)) = local_minimize(
            |x, u| f(x, u),
            &x0.to_vec(),
            &bounds,
            &cons,
            (),
            budget,
            RhoBeg::All(rhobeg),
            Some(StopTols {
                ftol_rel: 1e-8,
                ..StopTols::default()
            }),
        ) {
            debug!("incumbent polish stopped early: {status:?}");
        }

        let (xs, ys) = trace.into_inner();
        if ys.is_empty() {
            return Ok(());
        }
        let x = Array2::from_shape_vec((ys.len(), nx), xs)
            .map_err(|e| OptError::Acquisition(e.to_string()))?;
        let y = Array1::from_vec(ys);
        self.push_history(&x, &y);
        self.feed_model(&x, &y);
        Ok(())
    }

    /// The shared adaptive loop. Returns `true` when the variant asks for a
    /// restart with a fresh model and design.
    fn adaptive_loop(&mut self) -> Result<bool> {
        let dim = self.domain.dim();
        let n_consumed = self.n_eval;
        let adaptive_budget = self.budget_left();
        let sigma_init = DEFAULT_SIGMA;
        let mut n_success = 0usize;
        let mut n_fail = 0usize;
        let mut stagnation = 0usize;
        let mut phase = Phase::Perturb;
        let mut iter = 0usize;

        while self.budget_left() > 0 && !self.target_reached() {
            let weight = WEIGHT_CYCLE[iter % WEIGHT_CYCLE.len()];
            iter += 1;

            if self.config.algorithm == Algorithm::Dycors {
                let t = (self.n_eval - n_consumed) as f64;
                let total = adaptive_budget as f64;
                let decay = if total > 1. {
                    (1. - (t + 1.).ln() / total.ln()).clamp(0., 1.)
                } else {
                    0.
                };
                self.search
                    .set_perturb_prob((20. / dim as f64).min(1.) * decay);
            }

            let xnew: Array2<f64> = match self.config.algorithm {
                Algorithm::Bayesian => {
                    let f_min = self.best_value();
                    let x = self.ei.optimize(self.model.as_ref(), self.domain, f_min)?;
                    x.insert_axis(Axis(0))
                }
                Algorithm::Mlsl => {
                    let k = MLSL_BATCH.min(self.budget_left());
                    let pts = self.minima.optimize(self.model.as_ref(), self.domain, k)?;
                    if pts.nrows() > 0 {
                        pts
                    } else {
                        // every minimum sat in an already-sampled basin
                        self.search
                            .optimize(self.model.as_ref(), self.domain, 1, weight, None)?
                    }
                }
                Algorithm::Cptv { .. } if phase == Phase::Global => {
                    // target-value flavor: uniform candidates only
                    let n_cand = (100 * dim).min(5000);
                    let cand =
                        self.search
                            .generate_candidates(self.model.as_ref(), self.domain, n_cand);
                    let uniform = cand.slice(s![n_cand.., ..]);
                    self.search
                        .select_candidates(self.model.as_ref(), &uniform, 1, weight, None)?
                }
                _ => self
                    .search
                    .optimize(self.model.as_ref(), self.domain, 1, weight, None)?,
            };

            let take = xnew.nrows().min(self.budget_left());
            let xnew = if take < xnew.nrows() {
                xnew.slice(s![..take, ..]).to_owned()
            } else {
                xnew
            };

            let prev_best = self.best_value();
            let y = self.evaluate(&xnew);
            self.feed_model(&xnew, &y);
            let new_best = self.best_value();
            let improved = new_best < prev_best - IMPROVEMENT_RTOL * prev_best.abs();

            if self.config.disp {
                info!(
                    "iter {iter}: best {new_best:.6e} after {} evaluations",
                    self.n_eval
                );
            } else {
                debug!(
                    "iter {iter}: best {new_best:.6e} after {} evaluations",
                    self.n_eval
                );
            }

            match self.config.algorithm {
                Algorithm::Srs | Algorithm::Dycors => {
                    if improved {
                        n_success += 1;
                        n_fail = 0;
                    } else {
                        n_fail += 1;
                        n_success = 0;
                    }
                    if n_success >= SUCCESS_TOL {
                        self.search.set_sigma((self.search.sigma() * 2.).min(sigma_init));
                        n_success = 0;
                    }
                    if n_fail >= failure_tol(dim) {
                        self.search.set_sigma(self.search.sigma() / 2.);
                        n_fail = 0;
                    }
                    if self.search.sigma() < sigma_init * SIGMA_MIN_FACTOR {
                        if self.config.algorithm == Algorithm::Srs
                            && self.budget_left() >= 2 * (dim + 1)
                        {
                            return Ok(true);
                        }
                        self.search.set_sigma(sigma_init * SIGMA_MIN_FACTOR);
                    }
                }
                Algorithm::Cptv { local_polish } => {
                    if improved {
                        stagnation = 0;
                        n_success += 1;
                        n_fail = 0;
                    } else {
                        stagnation += 1;
                        n_fail += 1;
                        n_success = 0;
                    }
                    if phase == Phase::Perturb {
                        if n_success >= SUCCESS_TOL {
                            self.search.set_sigma((self.search.sigma() * 2.).min(sigma_init));
                            n_success = 0;
                        }
                        if n_fail >= failure_tol(dim) {
                            self.search.set_sigma((self.search.sigma() / 2.)
                                .max(sigma_init * SIGMA_MIN_FACTOR));
                            n_fail = 0;
                        }
                    }
                    if stagnation >= failure_tol(dim) {
                        if local_polish {
                            self.polish()?;
                        }
                        phase = match phase {
                            Phase::Perturb => Phase::Global,
                            Phase::Global => Phase::Perturb,
                        };
                        stagnation = 0;
                        self.search.set_sigma(sigma_init);
                        debug!("stagnation: switching search phase");
                    }
                }
                Algorithm::Mlsl | Algorithm::Bayesian => {}
            }
        }
        Ok(false)
    }

    fn run(mut self) -> Result<OptimResult> {
        let start = Instant::now();
        let dim = self.domain.dim();
        loop {
            self.initial_design()?;
            let restart = self.adaptive_loop()?;
            if restart && self.budget_left() >= 2 * (dim + 1) && !self.target_reached() {
                info!("step size collapsed, restarting with a fresh design");
                self.model.reset_data();
                self.search.set_sigma(DEFAULT_SIGMA);
                continue;
            }
            break;
        }

        let x_hist = Array2::from_shape_vec((self.n_eval, dim), self.x_hist)
            .map_err(|e| OptError::Acquisition(e.to_string()))?;
        let y_hist = Array1::from_vec(self.y_hist);
        let best = y_hist
            .iter()
            .enumerate()
            .filter(|(_, y)| y.is_finite())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        let (x_opt, y_opt) = match best {
            Some(i) => (x_hist.row(i).to_owned(), y_hist[i]),
            None => (x_hist.row(0).to_owned(), f64::INFINITY),
        };
        Ok(OptimResult {
            x_opt,
            y_opt,
            x_hist,
            y_hist,
            n_eval: self.n_eval,
            elapsed: start.elapsed(),
        })
    }
}
