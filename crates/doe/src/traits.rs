use linfa::Float;
use ndarray::Array2;

/// A sampling method able to generate a set of `ns` samples in a given
/// sample space `[lower_bound_xi, upper_bound_xi]^nx` within `R^nx`,
/// where `nx` is the dimension of the sample space.
pub trait SamplingMethod<F: Float> {
    /// Returns the bounds of the sample space as a `(nx, 2)` matrix where
    /// the ith row is the interval of the ith component of a sample.
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a `(ns, nx)`-shaped array of samples belonging to
    /// the `[0., 1.]^nx` hypercube.
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Generates a `(ns, nx)`-shaped array of samples belonging to the
    /// sample space given by [`SamplingMethod::sampling_space`].
    fn sample(&self, ns: usize) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        self.normalized_sample(ns) * scaler + lower
    }
}
