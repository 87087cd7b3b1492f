use ndarray::{Array1, ArrayView1};

/// Replaces non-finite observed outputs by the worst finite one so that a
/// fit stays well-posed when the objective occasionally fails to evaluate.
/// Returns `None` when no output is finite.
pub(crate) fn sanitize_outputs(y: &ArrayView1<f64>) -> Option<Array1<f64>> {
    let worst = y
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !worst.is_finite() {
        return None;
    }
    Some(y.mapv(|v| if v.is_finite() { v } else { worst }))
}

/// Relative tolerance used to flag a near-zero triangular factor diagonal.
pub(crate) const SINGULARITY_RTOL: f64 = 1e-10;

/// Returns whether an upper triangular factor signals a numerically
/// degenerate system (some diagonal entry vanishing relative to the
/// largest one).
pub(crate) fn is_degenerate(r_diag: impl Iterator<Item = f64>) -> bool {
    let diag: Vec<f64> = r_diag.map(f64::abs).collect();
    let dmax = diag.iter().copied().fold(0., f64::max);
    diag.iter().any(|&d| d <= SINGULARITY_RTOL * dmax) || dmax == 0.
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sanitize_outputs() {
        let y = array![1., f64::NAN, 3., f64::INFINITY];
        let clean = sanitize_outputs(&y.view()).unwrap();
        assert_abs_diff_eq!(clean, array![1., 3., 3., 3.]);
        assert!(sanitize_outputs(&array![f64::NAN].view()).is_none());
    }

    #[test]
    fn test_is_degenerate() {
        assert!(!is_degenerate([1., 0.5, 2.].into_iter()));
        assert!(is_degenerate([1., 1e-16, 2.].into_iter()));
        assert!(is_degenerate([0., 0.].into_iter()));
    }
}
