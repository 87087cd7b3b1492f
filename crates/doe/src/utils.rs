use linfa::Float;
use ndarray::{Array, Array1, Array2, ArrayBase, Data, Ix2, Zip};
use ndarray_stats::DeviationExt;

/// Computes the Euclidean distances between all pairs of rows of a 2D array,
/// returned in row-major pair order (the order of `(i, j)` with `i < j`).
pub fn pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    let nrows = x.nrows();
    let mut distances = Vec::with_capacity(nrows.saturating_sub(1) * nrows / 2);
    for i in 0..nrows {
        for j in (i + 1)..nrows {
            distances.push(F::cast(x.row(i).l2_dist(&x.row(j)).unwrap()));
        }
    }
    Array::from_vec(distances)
}

/// Computes the Euclidean distances between rows of `xa` and rows of `xb`
/// as a `(xa.nrows(), xb.nrows())` matrix.
///
/// **Panics** if `xa` and `xb` do not have the same number of columns.
pub fn cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let na = xa.ncols();
    let nb = xb.ncols();
    if na != nb {
        panic!("cdist: operands should have same nb of columns. Found {na} and {nb}");
    }

    let mut res = Array2::zeros((xa.nrows(), xb.nrows()));
    Zip::from(res.rows_mut()).and(xa.rows()).for_each(|mut row_res, row_a| {
        for (j, row_b) in xb.rows().into_iter().enumerate() {
            row_res[j] = F::cast(row_a.l2_dist(&row_b).unwrap());
        }
    });
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_pdist() {
        let x = array![[1., 0., 0.], [0., 1., 0.], [0., 2., 0.], [3., 4., 5.]];
        #[allow(clippy::approx_constant)]
        let expected = array![1.41421356, 2.23606798, 6.70820393, 1., 6.55743852, 6.164414];
        assert_abs_diff_eq!(pdist(&x), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_cdist() {
        let a = array![[0., 0.], [3., 4.]];
        let b = array![[0., 0.], [6., 8.], [3., 0.]];
        let expected = array![[0., 10., 3.], [5., 5., 4.]];
        assert_abs_diff_eq!(cdist(&a, &b), expected, epsilon = 1e-12);
    }
}
