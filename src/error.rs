//! # Errors
//!
//! Typed outcomes for estimation and the Monte Carlo driver. Per-replication
//! numerical failures are values, not panics: the driver records them and
//! keeps going.

use std::error::Error;
use std::fmt;

/// Crate-wide result alias.
pub type GarchResult<T> = Result<T, GarchError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GarchError {
  /// Generating parameters outside the admissible stationary region.
  InvalidParams { reason: String },

  /// Study configuration rejected before any simulation work starts.
  InvalidConfig { reason: String },

  /// The quasi-Newton solver aborted without producing a usable iterate.
  Optimizer { message: String },

  /// The fit cannot be standardized: singular curvature, kappa <= 1, or a
  /// non-positive diagonal in the asymptotic covariance. The raw estimate is
  /// carried along so callers can still inspect it.
  DegenerateFit { theta_hat: [f64; 3] },
}

impl fmt::Display for GarchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GarchError::InvalidParams { reason } => {
        write!(f, "invalid GARCH(1,1) parameters: {}", reason)
      }
      GarchError::InvalidConfig { reason } => {
        write!(f, "invalid Monte Carlo configuration: {}", reason)
      }
      GarchError::Optimizer { message } => {
        write!(f, "optimizer failure: {}", message)
      }
      GarchError::DegenerateFit { theta_hat } => {
        write!(
          f,
          "degenerate fit at theta = ({:.6}, {:.6}, {:.6}): asymptotic covariance unusable",
          theta_hat[0], theta_hat[1], theta_hat[2]
        )
      }
    }
  }
}

impl Error for GarchError {}
