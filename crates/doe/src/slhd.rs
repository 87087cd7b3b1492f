use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_xoshiro::Xoshiro256Plus;
use std::sync::{Arc, RwLock};

type RngRef<R> = Arc<RwLock<R>>;

/// Symmetric Latin hypercube design (SLHD).
///
/// Each dimension is divided into `ns` strata and each stratum holds exactly
/// one point (the Latin hypercube property). In addition the point set is
/// symmetric about the center of the design space: if `x` is a design point,
/// so is its mirror `l + u - x`. Symmetry improves the spread of small
/// designs, which is what makes the SLHD a good default to bootstrap a
/// surrogate model.
///
/// See Ye, Li and Sudjianto (2000), "Algorithmic construction of optimal
/// symmetric Latin hypercube designs", J. Statist. Plann. Inference 90.
#[derive(Clone, Debug)]
pub struct Slhd<F: Float, R: Rng> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// Random generator used for reproducibility
    rng: RngRef<R>,
}

impl<F: Float> Slhd<F, Xoshiro256Plus> {
    /// Constructor given a design space as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// ```
    /// use sabo_doe::Slhd;
    /// use ndarray::arr2;
    ///
    /// let doe = Slhd::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Slhd<F, R> {
    /// Constructor with given design space and random generator.
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        Slhd {
            xlimits: xlimits.to_owned(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Slhd<F, R2> {
        Slhd {
            xlimits: self.xlimits,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Builds one symmetric column of strata indices in `1..=ns`.
    ///
    /// Strata are assigned by pairing stratum `k` with its mirror `ns + 1 - k`:
    /// the first half of the rows receives a random side of each pair in random
    /// order, the second half receives the complements so that row `ns - 1 - i`
    /// always mirrors row `i`. An odd `ns` puts the central stratum in the
    /// middle row.
    fn symmetric_column(&self, ns: usize, rng: &mut R) -> Vec<usize> {
        let half = ns / 2;
        let mut pairs: Vec<usize> = (1..=half).collect();
        pairs.shuffle(rng);

        let mut col = vec![0; ns];
        for (i, &k) in pairs.iter().enumerate() {
            let v = if rng.gen::<bool>() { k } else { ns + 1 - k };
            col[i] = v;
            col[ns - 1 - i] = ns + 1 - v;
        }
        if ns % 2 == 1 {
            col[half] = (ns + 1) / 2;
        }
        col
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Slhd<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let mut lhs = Array2::zeros((ns, nx));
        let mut rng = self.rng.write().unwrap();
        for j in 0..nx {
            let col = self.symmetric_column(ns, &mut rng);
            for (i, &v) in col.iter().enumerate() {
                // stratum midpoint
                lhs[[i, j]] = F::cast((v as f64 - 0.5) / ns as f64);
            }
        }
        lhs
    }
}
