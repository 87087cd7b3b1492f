/*!
This library implements the space-filling designs used to bootstrap surrogate
models before any adaptive sampling takes place.

A sampling method generates a set of points within a design space `xlimits`
given as a 2D ndarray `(nx, 2)` specifying the lower and upper bound of each
of the `nx` components of a sample `x`.

Example:
```
use sabo_doe::{Random, SamplingMethod, Slhd};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// Design space is defined as [5., 10.] x [0., 1.], samples are 2-dimensional.
let xlimits = arr2(&[[5., 10.], [0., 1.]]);
// Six samples of a symmetric Latin hypercube design,
let doe = Slhd::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(42)).sample(6);
// or plain uniform sampling with a seeded generator for reproducibility.
let doe = Random::new(&xlimits).with_rng(Xoshiro256Plus::seed_from_u64(42)).sample(6);
```

Two kinds of sampling methods are provided:
* [Symmetric Latin hypercube design](crate::Slhd), used for initial designs,
* [Random sampling](crate::Random), used for uniform candidate pools.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod random;
mod slhd;
mod traits;
mod utils;

pub use random::*;
pub use slhd::*;
pub use traits::*;
pub use utils::{cdist, pdist};
