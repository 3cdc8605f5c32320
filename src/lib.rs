//! # garch-qmle
//!
//! $$
//! \sqrt{T}\,(\hat\theta_T - \theta_0) \;\xrightarrow{d}\;
//! \mathcal{N}\!\left(0, (\kappa - 1) H^{-1}\right)
//! $$
//!
//! Monte Carlo study of the finite-sample behavior of the Gaussian
//! quasi-maximum-likelihood estimator for GARCH(1,1). For many independent
//! synthetic series drawn from a known parameterization the crate fits the
//! model, records parameter estimates and standardized test statistics, and
//! aggregates them across replications.
//!
//! ## Modules
//!
//! | Module         | Description                                                      |
//! |----------------|------------------------------------------------------------------|
//! | [`garch`]      | Variance recursion, path generator and the QMLE pipeline.        |
//! | [`montecarlo`] | Sequential and rayon replication drivers plus result aggregates. |
//! | [`error`]      | Typed per-replication and configuration errors.                  |
//!
//! ## Example
//!
//! ```rust,no_run
//! use garch_qmle::{Garch11Params, MonteCarloStudy};
//!
//! let truth = Garch11Params::new(0.1, 0.05, 0.8);
//! let study = MonteCarloStudy::new(truth, 10_000, 1_000, 1).unwrap();
//! let result = study.run_par();
//! println!("usable alpha t-stats: {}", result.tstat_row(1).len());
//! ```

pub mod error;
pub mod garch;
pub mod montecarlo;

pub use error::GarchError;
pub use error::GarchResult;
pub use garch::params::Garch11Params;
pub use garch::qmle::estimate;
pub use garch::qmle::estimate_with_start;
pub use garch::qmle::Garch11Fit;
pub use garch::sim::Garch11;
pub use montecarlo::mean_sd;
pub use montecarlo::MonteCarloResult;
pub use montecarlo::MonteCarloStudy;
pub use montecarlo::ReplicationStatus;
