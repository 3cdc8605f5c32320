use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::garch::params::Garch11Params;

/// GARCH(1,1) path generator with Gaussian innovations.
///
/// The recursion seeds at the process's unconditional variance,
/// `sigma2_0 = omega / (1 - alpha - beta)` with `y_0 = sqrt(sigma2_0)`, so
/// `params` must be stationary (validated by the driver before any sampling).
/// The randomness source is supplied by the caller so replications can run on
/// independent, reproducible substreams.
pub struct Garch11 {
  pub params: Garch11Params,
  pub n: usize,
}

impl Garch11 {
  pub fn new(params: Garch11Params, n: usize) -> Self {
    Self { params, n }
  }

  /// Samples one return series of length `n`.
  pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
    let seed = self.params.unconditional_variance();
    let mut y_prev = seed.sqrt();
    let mut sigma2_prev = seed;

    let mut y = Array1::<f64>::zeros(self.n);
    for t in 0..self.n {
      let sigma2 = self.params.omega
        + self.params.alpha * y_prev.powi(2)
        + self.params.beta * sigma2_prev;
      let z: f64 = rng.sample(StandardNormal);
      y[t] = sigma2.sqrt() * z;
      y_prev = y[t];
      sigma2_prev = sigma2;
    }
    y
  }
}
