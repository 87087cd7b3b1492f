/*!
This library implements the surrogate models used by the `sabo` optimization
driver: a radial-basis-function (RBF) interpolator and a Gaussian-process
(ordinary kriging) regressor, both behind the object-safe [`Surrogate`] trait.

A surrogate owns its training set and is mutated only through
[`Surrogate::update`] which appends new samples and refits the model.
Fitting a degenerate system (duplicate or collinear points) fails with
[`ModelError::SingularFit`] which the caller is expected to handle by
perturbing or dropping the offending points.

Example:
```
use sabo_model::{RbfModel, Surrogate};
use ndarray::{array, Axis};

let mut model = RbfModel::default();
let xt = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
let yt = xt.map_axis(Axis(1), |x| x[0] + 2.0 * x[1]);
model.update(&xt.view(), &yt.view()).expect("RBF fit");
let pred = model.predict(&array![[0.5, 0.5]].view()).expect("RBF prediction");
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod errors;
mod filter;
mod gp;
mod kernels;
mod rbf;
mod surrogate;
mod utils;

pub mod correlation;

pub use errors::*;
pub use filter::*;
pub use gp::*;
pub use kernels::*;
pub use rbf::*;
pub use surrogate::*;
