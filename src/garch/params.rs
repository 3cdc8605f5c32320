use ndarray::Array1;

use crate::error::GarchError;
use crate::error::GarchResult;

/// Persistence cap used when seeding the variance recursion at arbitrary
/// trial parameters. The seed is floored at `omega / (1 - 0.99)` so it stays
/// strictly positive and finite even when `alpha + beta >= 1` during the
/// optimizer's search.
pub const SEED_PERSISTENCE_CAP: f64 = 0.99;

/// GARCH(1,1) parameter vector in `(omega, alpha, beta)` order.
///
/// # Notes
/// 1. Covariance stationarity of the generating process requires
///    `alpha + beta < 1`; only then is the unconditional variance
///    `omega / (1 - alpha - beta)` finite.
/// 2. Trial vectors visited by the optimizer are deliberately NOT validated,
///    only floored via [`Garch11Params::variance_seed`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Garch11Params {
  pub omega: f64,
  pub alpha: f64,
  pub beta: f64,
}

impl Garch11Params {
  pub fn new(omega: f64, alpha: f64, beta: f64) -> Self {
    Self { omega, alpha, beta }
  }

  /// Checks admissibility of a generating ("truth") parameterization.
  pub fn validate(&self) -> GarchResult<()> {
    if !self.omega.is_finite() || self.omega <= 0.0 {
      return Err(GarchError::InvalidParams {
        reason: format!("omega must be positive and finite, got {}", self.omega),
      });
    }
    if !self.alpha.is_finite() || self.alpha <= 0.0 {
      return Err(GarchError::InvalidParams {
        reason: format!("alpha must be positive and finite, got {}", self.alpha),
      });
    }
    if !self.beta.is_finite() || self.beta <= 0.0 {
      return Err(GarchError::InvalidParams {
        reason: format!("beta must be positive and finite, got {}", self.beta),
      });
    }
    if self.persistence() >= 1.0 {
      return Err(GarchError::InvalidParams {
        reason: format!(
          "stationarity requires alpha + beta < 1, got {} + {} = {}",
          self.alpha,
          self.beta,
          self.persistence()
        ),
      });
    }
    Ok(())
  }

  /// Persistence `alpha + beta`.
  pub fn persistence(&self) -> f64 {
    self.alpha + self.beta
  }

  /// Unconditional variance `omega / (1 - alpha - beta)` of a stationary
  /// process. Finite and positive only when `alpha + beta < 1`; the path
  /// generator seeds from this, so generating parameters must pass
  /// [`Garch11Params::validate`] first.
  pub fn unconditional_variance(&self) -> f64 {
    self.omega / (1.0 - self.persistence())
  }

  /// Estimation-side seed variance
  /// `max(omega / (1 - alpha - beta), omega / (1 - 0.99))`.
  ///
  /// The `omega / 0.01` term guarantees a strictly positive, finite seed at
  /// every trial vector the optimizer visits, including `alpha + beta >= 1`
  /// where the unconditional variance is negative or infinite. The recursion
  /// forgets the seed geometrically, so the transient is irrelevant for the
  /// likelihood of any realistic sample size.
  pub fn variance_seed(&self) -> f64 {
    let uncond = self.unconditional_variance();
    let floor = self.omega / (1.0 - SEED_PERSISTENCE_CAP);
    if uncond.is_finite() {
      uncond.max(floor)
    } else {
      floor
    }
  }

  /// Conditional-variance sequence for an observed series `y`, as
  /// reconstructed on the estimation side (objective and innovation filter).
  ///
  /// Seeds at `(y0, sigma2_0) = (sqrt(s), s)` with `s` the estimation-side
  /// seed variance, then runs the causal recursion
  /// `sigma2[t] = omega + alpha * y[t-1]^2 + beta * sigma2[t-1]`.
  pub fn conditional_variances(&self, y: &Array1<f64>) -> Array1<f64> {
    let seed = self.variance_seed();
    let mut sigma2 = Array1::<f64>::zeros(y.len());
    for t in 0..y.len() {
      sigma2[t] = if t == 0 {
        // y0 = sqrt(seed), so alpha * y0^2 collapses onto the seed itself
        self.omega + (self.alpha + self.beta) * seed
      } else {
        self.omega + self.alpha * y[t - 1].powi(2) + self.beta * sigma2[t - 1]
      };
    }
    sigma2
  }

  pub fn to_array(&self) -> [f64; 3] {
    [self.omega, self.alpha, self.beta]
  }

  pub fn from_array(theta: &[f64; 3]) -> Self {
    Self::new(theta[0], theta[1], theta[2])
  }
}
