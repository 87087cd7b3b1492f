//! Acquisition strategies: the policies turning a surrogate model into the
//! next evaluation point(s).
//!
//! * [`CycleSearch`] is the general-purpose candidate search shared by the
//!   response-surface variants: a pool of perturbed plus uniform candidates
//!   scored by a weighted blend of predicted value and distance to the
//!   training set.
//! * [`MinimaSearch`] hunts for diverse local minima of the surrogate
//!   landscape, used by the clustering-flavored global search.
//! * [`MaximizeEi`] maximizes expected improvement over the box, paired
//!   with the Gaussian-process model.

mod cycle_search;
mod ei;
mod minima_search;

pub use cycle_search::*;
pub use ei::*;
pub use minima_search::*;
