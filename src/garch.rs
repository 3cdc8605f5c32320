//! # GARCH(1,1)
//!
//! $$
//! \sigma_t^2 = \omega + \alpha \, y_{t-1}^2 + \beta \, \sigma_{t-1}^2,
//! \quad y_t = \sigma_t \, z_t, \quad z_t \sim \mathcal{N}(0,1)
//! $$
//!
//! Simulation seeds the recursion at the unconditional variance of the
//! (validated, stationary) truth; the quasi-likelihood objective and the
//! innovation filter share the guarded estimation-side seed in [`params`],
//! since the optimizer also visits non-stationary trial vectors. Divergent
//! seeding between objective and filter is the classic way to break a QMLE
//! study.

pub mod params;
pub mod qmle;
pub mod sim;

pub use params::Garch11Params;
pub use qmle::Garch11Fit;
pub use sim::Garch11;
