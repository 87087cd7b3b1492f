use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, array, concatenate};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use sabo_model::Surrogate;
use sabo_opt::{CycleSearch, Domain, MaximizeEi, MinimaSearch, OptError, expected_improvement};

/// Surrogate stub predicting the coordinate sum of each point.
struct SumSurrogate {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl SumSurrogate {
    fn with_train(x: Array2<f64>) -> Self {
        let y = x.map_axis(Axis(1), |r| r.sum());
        SumSurrogate { x, y }
    }
}

impl Surrogate for SumSurrogate {
    fn xtrain(&self) -> ArrayView2<f64> {
        self.x.view()
    }
    fn ytrain(&self) -> ArrayView1<f64> {
        self.y.view()
    }
    fn iindex(&self) -> &[usize] {
        &[]
    }
    fn update(&mut self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> sabo_model::Result<()> {
        self.x = concatenate![Axis(0), self.x, *x];
        self.y = concatenate![Axis(0), self.y, *y];
        Ok(())
    }
    fn predict(&self, x: &ArrayView2<f64>) -> sabo_model::Result<Array1<f64>> {
        Ok(x.map_axis(Axis(1), |r| r.sum()))
    }
    fn eval_kernel(
        &self,
        x: &ArrayView2<f64>,
        y: Option<&ArrayView2<f64>>,
    ) -> sabo_model::Result<Array2<f64>> {
        let ncols = y.map_or(x.nrows(), |y| y.nrows());
        Ok(Array2::zeros((x.nrows(), ncols)))
    }
    fn check_initial_design(&self, _sample: &ArrayView2<f64>) -> bool {
        true
    }
    fn min_design_space_size(&self, _dim: usize) -> usize {
        1
    }
    fn reset_data(&mut self) {
        self.x = Array2::zeros((0, self.x.ncols()));
        self.y = Array1::zeros(0);
    }
}

/// Like [`SumSurrogate`] but with a unit predictive spread everywhere.
struct UncertainSum(SumSurrogate);

impl Surrogate for UncertainSum {
    fn xtrain(&self) -> ArrayView2<f64> {
        self.0.xtrain()
    }
    fn ytrain(&self) -> ArrayView1<f64> {
        self.0.ytrain()
    }
    fn iindex(&self) -> &[usize] {
        &[]
    }
    fn update(&mut self, x: &ArrayView2<f64>, y: &ArrayView1<f64>) -> sabo_model::Result<()> {
        self.0.update(x, y)
    }
    fn predict(&self, x: &ArrayView2<f64>) -> sabo_model::Result<Array1<f64>> {
        self.0.predict(x)
    }
    fn predict_valvar(
        &self,
        x: &ArrayView2<f64>,
    ) -> sabo_model::Result<(Array1<f64>, Array1<f64>)> {
        let mean = self.0.predict(x)?;
        let spread = Array1::ones(x.nrows());
        Ok((mean, spread))
    }
    fn eval_kernel(
        &self,
        x: &ArrayView2<f64>,
        y: Option<&ArrayView2<f64>>,
    ) -> sabo_model::Result<Array2<f64>> {
        self.0.eval_kernel(x, y)
    }
    fn check_initial_design(&self, _sample: &ArrayView2<f64>) -> bool {
        true
    }
    fn min_design_space_size(&self, _dim: usize) -> usize {
        1
    }
    fn reset_data(&mut self) {
        self.0.reset_data()
    }
}

/// Evaluability stub scoring the first candidate 0.1 and the rest 1.0.
struct FirstRejected {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl FirstRejected {
    fn new() -> Self {
        FirstRejected {
            x: Array2::zeros((0, 0)),
            y: Array1::zeros(0),
        }
    }
}

impl Surrogate for FirstRejected {
    fn xtrain(&self) -> ArrayView2<f64> {
        self.x.view()
    }
    fn ytrain(&self) -> ArrayView1<f64> {
        self.y.view()
    }
    fn iindex(&self) -> &[usize] {
        &[]
    }
    fn update(&mut self, _x: &ArrayView2<f64>, _y: &ArrayView1<f64>) -> sabo_model::Result<()> {
        Ok(())
    }
    fn predict(&self, x: &ArrayView2<f64>) -> sabo_model::Result<Array1<f64>> {
        Ok(Array1::from_shape_fn(
            x.nrows(),
            |i| if i == 0 { 0.1 } else { 1.0 },
        ))
    }
    fn eval_kernel(
        &self,
        x: &ArrayView2<f64>,
        y: Option<&ArrayView2<f64>>,
    ) -> sabo_model::Result<Array2<f64>> {
        let ncols = y.map_or(x.nrows(), |y| y.nrows());
        Ok(Array2::zeros((x.nrows(), ncols)))
    }
    fn check_initial_design(&self, _sample: &ArrayView2<f64>) -> bool {
        true
    }
    fn min_design_space_size(&self, _dim: usize) -> usize {
        1
    }
    fn reset_data(&mut self) {}
}

fn search(seed: u64) -> CycleSearch<Xoshiro256Plus> {
    CycleSearch::new_with_rng(Xoshiro256Plus::seed_from_u64(seed))
}

#[test]
fn test_generate_candidates_count_and_bounds() {
    for (bounds, n_cand) in [
        (array![[0., 10.], [0., 10.]], 50),
        (array![[-3., 7.], [0., 1.], [100., 200.]], 17),
        (array![[0., 0.5]], 1),
    ] {
        let domain = Domain::new(&bounds).unwrap();
        let model = SumSurrogate::with_train(bounds.mean_axis(Axis(1)).unwrap().insert_axis(Axis(0)));
        let cand = search(0).generate_candidates(&model, &domain, n_cand);
        assert_eq!(cand.dim(), (2 * n_cand, domain.dim()));
        assert!(domain.contains(&cand));
    }
}

#[test]
fn test_generate_candidates_rounds_integral_dims() {
    // first dimension has whole-number bounds, second does not
    let domain = Domain::new(&array![[0., 10.], [0., 5.5]]).unwrap();
    assert_eq!(domain.iindex(), &[0]);
    let model = SumSurrogate::with_train(array![[5., 2.5], [3., 1.]]);
    let cand = search(3).generate_candidates(&model, &domain, 40);
    assert!(cand.column(0).iter().all(|v| v.fract() == 0.));
    assert!(cand.column(1).iter().any(|v| v.fract() != 0.));
}

#[test]
fn test_optimize_shape_and_bounds() {
    let domain = Domain::new(&array![[0., 10.], [0., 10.], [0., 10.]]).unwrap();
    let model = SumSurrogate::with_train(array![[5., 5., 5.], [2., 8., 3.]]);
    for n in [1, 4, 7] {
        let x = search(1).optimize(&model, &domain, n, 0.5, None).unwrap();
        assert_eq!(x.dim(), (n, 3));
        assert!(domain.contains(&x));
    }
}

#[test]
fn test_selection_tied_value_prefers_distance() {
    let model = SumSurrogate::with_train(array![[5., 5.]]);
    let candidates = array![[0., 0.], [9., 1.], [4., 6.]];
    let picked = search(0)
        .select_candidates(&model, &candidates.view(), 1, 0.5, Some(&FirstRejected::new()))
        .unwrap();
    // [9,1] and [4,6] predict the same value; [9,1] sits farther from [5,5]
    assert_abs_diff_eq!(picked, array![[9., 1.]]);
}

#[test]
fn test_selection_tied_distance_prefers_value() {
    let model = SumSurrogate::with_train(array![[5., 5.]]);
    let candidates = array![[0., 0.], [3., 5.], [7., 5.]];
    let picked = search(0)
        .select_candidates(&model, &candidates.view(), 1, 0.5, Some(&FirstRejected::new()))
        .unwrap();
    // both survivors sit 2 away from [5,5]; [3,5] predicts lower
    assert_abs_diff_eq!(picked, array![[3., 5.]]);
}

#[test]
fn test_selection_weighted_blend() {
    let model = SumSurrogate::with_train(array![[5., 5.], [6., 6.], [3., 4.]]);
    let candidates = array![[0., 0.], [2., 6.], [7., 0.5]];
    let picked = search(0)
        .select_candidates(&model, &candidates.view(), 1, 0.75, Some(&FirstRejected::new()))
        .unwrap();
    // [7,0.5] wins on both signals once [0,0] is filtered out
    assert_abs_diff_eq!(picked, array![[7., 0.5]]);
}

#[test]
fn test_evaluability_filter_is_a_hard_veto() {
    let model = SumSurrogate::with_train(array![[5., 5.]]);
    // the first candidate dominates on both signals yet scores 0.1
    let candidates = array![[9., 9.], [5.1, 5.1], [5.2, 5.2]];
    let picked = search(0)
        .select_candidates(&model, &candidates.view(), 2, 0.5, Some(&FirstRejected::new()))
        .unwrap();
    for row in picked.rows() {
        assert!(row != array![9., 9.].view());
    }
}

#[test]
fn test_score_weight_trades_distance_for_value() {
    let model = SumSurrogate::with_train(array![[5., 5.]]);
    // near candidate predicts low, far candidate predicts high
    let candidates = array![[4.5, 4.5], [9., 9.]];
    let s = search(0);
    let w0 = s.select_candidates(&model, &candidates.view(), 1, 0., None).unwrap();
    assert_abs_diff_eq!(w0, array![[4.5, 4.5]]);
    let w1 = s.select_candidates(&model, &candidates.view(), 1, 1., None).unwrap();
    assert_abs_diff_eq!(w1, array![[9., 9.]]);
    // at the midpoint the scores tie exactly and distance breaks the tie
    let w05 = s.select_candidates(&model, &candidates.view(), 1, 0.5, None).unwrap();
    assert_abs_diff_eq!(w05, array![[9., 9.]]);
}

#[test]
fn test_selection_fails_when_filter_starves_the_request() {
    let model = SumSurrogate::with_train(array![[5., 5.]]);
    let candidates = array![[1., 1.], [2., 2.]];
    let err = search(0)
        .select_candidates(&model, &candidates.view(), 2, 0.5, Some(&FirstRejected::new()))
        .unwrap_err();
    assert!(matches!(err, OptError::Acquisition(_)));
}

#[test]
fn test_minima_search_finds_the_unexplored_basin() {
    // the surrogate decreases toward the origin; training sits in the
    // opposite corner so the minimum survives the separation filter
    let domain = Domain::new(&array![[0., 1.], [0., 1.]]).unwrap();
    let model = SumSurrogate::with_train(array![[1., 1.]]);
    let minima = MinimaSearch::new_with_rng(Xoshiro256Plus::seed_from_u64(0))
        .optimize(&model, &domain, 3)
        .unwrap();
    assert_eq!(minima.nrows(), 1);
    assert!(minima[[0, 0]] < 0.1 && minima[[0, 1]] < 0.1);
}

#[test]
fn test_minima_search_drops_minima_near_evaluated_points() {
    // training already sits on the minimum, nothing should survive
    let domain = Domain::new(&array![[0., 1.], [0., 1.]]).unwrap();
    let model = SumSurrogate::with_train(array![[0., 0.]]);
    let minima = MinimaSearch::new_with_rng(Xoshiro256Plus::seed_from_u64(0))
        .optimize(&model, &domain, 3)
        .unwrap();
    assert_eq!(minima.nrows(), 0);
}

#[test]
fn test_expected_improvement_values() {
    let model = UncertainSum(SumSurrogate::with_train(array![[1., 1.]]));
    let ei = expected_improvement(&model, &array![[0., 0.], [50., 50.]].view(), 0.5).unwrap();
    // mean 0, spread 1, f_min 0.5: u = 0.5, EI = 0.5 cdf(0.5) + pdf(0.5)
    assert_abs_diff_eq!(ei[0], 0.6978, epsilon = 1e-3);
    // hopeless candidate
    assert!(ei[1] < 1e-6);
}

#[test]
fn test_expected_improvement_is_zero_without_spread() {
    let model = SumSurrogate::with_train(array![[1., 1.]]);
    let ei = expected_improvement(&model, &array![[0., 0.]].view(), 0.5).unwrap();
    assert_abs_diff_eq!(ei[0], 0.);
}

#[test]
fn test_maximize_ei_targets_the_low_mean_region() {
    let domain = Domain::new(&array![[0., 1.5], [0., 1.5]]).unwrap();
    let model = UncertainSum(SumSurrogate::with_train(array![[1., 1.]]));
    let x = MaximizeEi::new_with_rng(Xoshiro256Plus::seed_from_u64(0))
        .optimize(&model, &domain, 0.5)
        .unwrap();
    assert_eq!(x.len(), 2);
    assert!(x.sum() < 0.3, "EI maximizer drifted to {x}");
}
