/*!
This library implements a derivative-free, surrogate-assisted global
optimization engine: an expensive black-box objective over a bounded,
possibly mixed integer/continuous domain is approximated by a cheap
surrogate model ([`sabo_model`]) fitted to the evaluated points, and the
surrogate decides where to sample next, within a strict budget of objective
evaluations.

Three layers:

* [`Domain`]: validated box bounds with derived integrality,
* the acquisition strategies ([`CycleSearch`], [`MinimaSearch`],
  [`MaximizeEi`]) turning a surrogate into the next evaluation point(s),
* the driver ([`minimize`], [`run_batch`]) sequencing initial design, model
  updates and acquisitions, with the variants ([`Algorithm`]) expressed as
  configuration over one shared loop.

Example:
```no_run
use ndarray::{array, Axis};
use sabo_opt::{minimize, Algorithm, Domain, OptConfig};

let objf = |x: &ndarray::ArrayView2<f64>| {
    x.map_axis(Axis(1), |row| row.iter().map(|v| v * v).sum())
};
let domain = Domain::new(&array![[-5., 5.], [-5., 5.]]).expect("valid bounds");
let config = OptConfig::new(60).algorithm(Algorithm::Dycors).seed(0);
let res = minimize(&objf, &domain, &config).expect("run");
println!("{res}");
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod acquisition;
mod domain;
mod errors;
mod solver;
mod types;
mod utils;

pub use acquisition::*;
pub use domain::*;
pub use errors::*;
pub use solver::*;
pub use types::*;
