use crate::errors::{OptError, Result};
use sabo_model::correlation::{Matern52Corr, SquaredExponentialCorr};
use sabo_model::{
    CubicRadialBasis, GaussianProcess, IdentityFilter, LinearRadialBasis, MedianLpfFilter,
    RbfModel, Surrogate, ThinPlateRadialBasis,
};
use serde::{Deserialize, Serialize};

/// Scoring-weight cycle of the candidate search, advanced one step per
/// iteration. Low weights exploit the surrogate, high weights explore.
pub(crate) const WEIGHT_CYCLE: [f64; 4] = [0.3, 0.5, 0.8, 0.95];
/// Fraction of the initial spread below which the step size is considered
/// collapsed (`2^-6`).
pub(crate) const SIGMA_MIN_FACTOR: f64 = 0.015625;
/// Consecutive improvements doubling the perturbation spread.
pub(crate) const SUCCESS_TOL: usize = 3;

/// Consecutive non-improving iterations halving the perturbation spread
/// (and switching phases for the CPTV variants).
pub(crate) fn failure_tol(dim: usize) -> usize {
    dim.max(5)
}

/// Optimization algorithm variant: one shared driver loop, per-variant
/// acquisition and control policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Stochastic response surface with restarts: candidate search around
    /// evaluated points, step size adapted from success/failure streaks,
    /// fresh model and design when the step size collapses.
    Srs,
    /// DYCORS-style schedule: the per-coordinate perturbation probability
    /// decays as the budget is consumed, turning the search local late in
    /// the run.
    Dycors,
    /// Coordinate-perturbation / target-value alternation, switching phase
    /// after a stagnation streak. `local_polish` additionally runs a local
    /// refinement of the incumbent at each phase transition.
    Cptv {
        /// Polish the incumbent with a derivative-free local search at
        /// phase transitions (consumes budget).
        local_polish: bool,
    },
    /// Clustering-flavored global search: rounds of surrogate-minima
    /// proposals, falling back to the candidate search when no minimum
    /// survives the separation filter.
    Mlsl,
    /// Bayesian optimization: Gaussian process plus expected-improvement
    /// maximization, one point per iteration.
    Bayesian,
}

impl Algorithm {
    /// The surrogate this variant pairs with by default.
    pub fn default_model(&self) -> ModelSpec {
        match self {
            Algorithm::Bayesian => ModelSpec::Gp {
                corr: CorrSpec::SquaredExponential,
                normalize_y: true,
            },
            _ => ModelSpec::Rbf {
                kernel: RbfKernelSpec::Cubic,
                filter: FilterSpec::MedianLpf,
            },
        }
    }
}

/// Radial basis function choice for an RBF model descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RbfKernelSpec {
    /// `phi(r) = r`, constant polynomial tail
    Linear,
    /// `phi(r) = r^3`, linear polynomial tail
    Cubic,
    /// `phi(r) = r^2 ln(r)`, linear polynomial tail
    ThinPlate,
}

/// Output filter choice for an RBF model descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterSpec {
    /// Outputs fed to the fit unchanged
    Identity,
    /// Outputs above the median clamped to the median
    MedianLpf,
}

/// Correlation kernel choice for a Gaussian-process descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrSpec {
    /// Squared exponential correlation
    SquaredExponential,
    /// Matern 5/2 correlation
    Matern52,
}

/// Immutable surrogate descriptor. Each run builds its own fresh model
/// instance from the descriptor, so independent runs never share mutable
/// model state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSpec {
    /// Radial-basis-function interpolation
    Rbf {
        /// Kernel choice
        kernel: RbfKernelSpec,
        /// Output filter choice
        filter: FilterSpec,
    },
    /// Gaussian process (ordinary kriging)
    Gp {
        /// Correlation kernel choice
        corr: CorrSpec,
        /// Normalize observed outputs to zero mean and unit variance
        normalize_y: bool,
    },
}

impl ModelSpec {
    /// Instantiates a fresh surrogate tracking the given integral coordinates.
    pub fn build(&self, iindex: Vec<usize>) -> Box<dyn Surrogate> {
        match self {
            ModelSpec::Rbf { kernel, filter } => {
                let model = RbfModel::new().with_iindex(iindex);
                let model = match kernel {
                    RbfKernelSpec::Linear => model.kernel(LinearRadialBasis),
                    RbfKernelSpec::Cubic => model.kernel(CubicRadialBasis),
                    RbfKernelSpec::ThinPlate => model.kernel(ThinPlateRadialBasis),
                };
                match filter {
                    FilterSpec::Identity => Box::new(model.filter(IdentityFilter)),
                    FilterSpec::MedianLpf => Box::new(model.filter(MedianLpfFilter)),
                }
            }
            ModelSpec::Gp { corr, normalize_y } => {
                let model = GaussianProcess::new()
                    .normalize_y(*normalize_y)
                    .with_iindex(iindex);
                match corr {
                    CorrSpec::SquaredExponential => Box::new(model.corr(SquaredExponentialCorr)),
                    CorrSpec::Matern52 => Box::new(model.corr(Matern52Corr)),
                }
            }
        }
    }
}

/// Configuration of one optimization run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptConfig {
    pub(crate) max_eval: usize,
    pub(crate) algorithm: Algorithm,
    pub(crate) model: Option<ModelSpec>,
    pub(crate) target: Option<f64>,
    pub(crate) seed: u64,
    pub(crate) disp: bool,
}

impl OptConfig {
    /// Constructor with the total evaluation budget; everything else takes
    /// its default (SRS algorithm, variant-default model, seed 42).
    pub fn new(max_eval: usize) -> Self {
        OptConfig {
            max_eval,
            algorithm: Algorithm::Srs,
            model: None,
            target: None,
            seed: 42,
            disp: false,
        }
    }

    /// Selects the algorithm variant.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Overrides the variant-default surrogate descriptor.
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.model = Some(model);
        self
    }

    /// Stops the run as soon as an observed value reaches the target.
    pub fn target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Seeds the run's random generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Logs per-iteration progress at info level instead of debug.
    pub fn disp(mut self, disp: bool) -> Self {
        self.disp = disp;
        self
    }

    /// Rejects configurations that cannot drive a run.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_eval == 0 {
            return Err(OptError::InvalidConfig(
                "max_eval must be positive".to_string(),
            ));
        }
        if self.target.is_some_and(|t| !t.is_finite()) {
            return Err(OptError::InvalidConfig(
                "target must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_default_models_per_variant() {
        assert!(matches!(
            Algorithm::Bayesian.default_model(),
            ModelSpec::Gp { normalize_y: true, .. }
        ));
        assert!(matches!(
            Algorithm::Dycors.default_model(),
            ModelSpec::Rbf { kernel: RbfKernelSpec::Cubic, filter: FilterSpec::MedianLpf }
        ));
    }

    #[test]
    fn test_model_spec_builds_fresh_instances() {
        let spec = ModelSpec::Rbf {
            kernel: RbfKernelSpec::Cubic,
            filter: FilterSpec::Identity,
        };
        let mut a = spec.build(vec![1]);
        let b = spec.build(vec![1]);
        assert_eq!(a.iindex(), &[1]);
        let x = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let y = array![0., 1., 2., 3.];
        a.update(&x.view(), &y.view()).unwrap();
        // the sibling instance is untouched
        assert_eq!(a.ntrain(), 4);
        assert_eq!(b.ntrain(), 0);
    }

    #[test]
    fn test_config_roundtrips_through_serde() {
        let cfg = OptConfig::new(200)
            .algorithm(Algorithm::Cptv { local_polish: true })
            .target(1e-3)
            .seed(7);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: OptConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_eval, 200);
        assert_eq!(back.algorithm, Algorithm::Cptv { local_polish: true });
        assert_eq!(back.seed, 7);
    }
}
