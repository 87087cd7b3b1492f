use crate::errors::{OptError, Result};
use ndarray::{Array1, Array2, ArrayBase, ArrayViewMut2, Axis, Data, Ix2};

/// A validated box-constrained design space.
///
/// Bounds are given as a `(nx, 2)` matrix of `[lower, upper]` rows. A
/// dimension whose two bounds are both whole numbers is treated as integral:
/// candidate coordinates along it are rounded to the nearest integer before
/// being scored or evaluated. Integrality is derived from the bounds and is
/// never set independently.
#[derive(Clone, Debug)]
pub struct Domain {
    bounds: Array2<f64>,
    iindex: Vec<usize>,
}

impl Domain {
    /// Builds a domain from a `(nx, 2)` bounds matrix.
    ///
    /// Fails with [`OptError::InvalidBounds`] when the matrix does not have
    /// two columns, when a bound is non-finite, or when `lower >= upper` on
    /// some dimension.
    pub fn new(bounds: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Self> {
        if bounds.ncols() != 2 {
            return Err(OptError::InvalidBounds(format!(
                "expected a (nx, 2) matrix, got {} columns",
                bounds.ncols()
            )));
        }
        if bounds.nrows() == 0 {
            return Err(OptError::InvalidBounds("empty bounds".to_string()));
        }
        for (i, row) in bounds.rows().into_iter().enumerate() {
            let (lo, up) = (row[0], row[1]);
            if !lo.is_finite() || !up.is_finite() {
                return Err(OptError::InvalidBounds(format!(
                    "non-finite bound on dimension {i}: [{lo}, {up}]"
                )));
            }
            if lo >= up {
                return Err(OptError::InvalidBounds(format!(
                    "lower >= upper on dimension {i}: [{lo}, {up}]"
                )));
            }
        }
        let iindex = bounds
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row[0].fract() == 0. && row[1].fract() == 0.)
            .map(|(i, _)| i)
            .collect();
        Ok(Domain {
            bounds: bounds.to_owned(),
            iindex,
        })
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.bounds.nrows()
    }

    /// The `(nx, 2)` bounds matrix.
    pub fn bounds(&self) -> &Array2<f64> {
        &self.bounds
    }

    /// Indices of the integral dimensions.
    pub fn iindex(&self) -> &[usize] {
        &self.iindex
    }

    /// Per-dimension width `upper - lower`.
    pub fn span(&self) -> Array1<f64> {
        &self.bounds.column(1) - &self.bounds.column(0)
    }

    /// Euclidean length of the box diagonal.
    pub fn diameter(&self) -> f64 {
        self.span().mapv(|v| v * v).sum().sqrt()
    }

    /// Bounds as `(lower, upper)` pairs, the layout the local optimizer takes.
    pub fn as_pairs(&self) -> Vec<(f64, f64)> {
        self.bounds.rows().into_iter().map(|r| (r[0], r[1])).collect()
    }

    /// Clamps every point of `x` into the box, componentwise.
    pub fn clip(&self, x: &mut ArrayViewMut2<f64>) {
        for mut row in x.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = v.clamp(self.bounds[[j, 0]], self.bounds[[j, 1]]);
            }
        }
    }

    /// Rounds integral coordinates of every point of `x` to the nearest
    /// whole number. Rounding keeps points inside the box since integral
    /// bounds are whole numbers themselves.
    pub fn round_integral(&self, x: &mut ArrayViewMut2<f64>) {
        for mut row in x.rows_mut() {
            for &j in &self.iindex {
                row[j] = row[j].round();
            }
        }
    }

    /// Whether every point of `x` lies inside the box.
    pub fn contains(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> bool {
        x.rows().into_iter().all(|row| {
            row.iter()
                .enumerate()
                .all(|(j, &v)| v >= self.bounds[[j, 0]] && v <= self.bounds[[j, 1]])
        })
    }

    /// Uniform midpoint of the box, a deterministic fallback start point.
    pub fn center(&self) -> Array1<f64> {
        self.bounds.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rejects_malformed_bounds() {
        assert!(matches!(
            Domain::new(&array![[0., 0.]]),
            Err(OptError::InvalidBounds(_))
        ));
        assert!(matches!(
            Domain::new(&array![[3., 1.]]),
            Err(OptError::InvalidBounds(_))
        ));
        assert!(matches!(
            Domain::new(&array![[0., f64::INFINITY]]),
            Err(OptError::InvalidBounds(_))
        ));
        assert!(Domain::new(&array![[0., 1.], [-5., 5.]]).is_ok());
    }

    #[test]
    fn test_integrality_derived_from_bounds() {
        let d = Domain::new(&array![[0., 10.], [0.5, 2.5], [-3., 3.]]).unwrap();
        assert_eq!(d.iindex(), &[0, 2]);
    }

    #[test]
    fn test_clip_and_round() {
        let d = Domain::new(&array![[0., 10.], [0., 1.]]).unwrap();
        let mut x = array![[12., 0.4], [-1., 2.]];
        d.clip(&mut x.view_mut());
        d.round_integral(&mut x.view_mut());
        assert_abs_diff_eq!(x, array![[10., 0.4], [0., 1.]]);
        assert!(d.contains(&x));
    }

    #[test]
    fn test_span_and_diameter() {
        let d = Domain::new(&array![[0., 3.], [0., 4.]]).unwrap();
        assert_abs_diff_eq!(d.span(), array![3., 4.]);
        assert_abs_diff_eq!(d.diameter(), 5.);
    }
}
