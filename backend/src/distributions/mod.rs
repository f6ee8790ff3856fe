//! Distribution samplers
//!
//! Samplers are inherent methods on [`RandomStream`](crate::RandomStream)
//! built only from its public draw primitives, so any stream (and any
//! generator behind it) can feed any distribution.
//!
//! # Out-of-domain parameters
//!
//! Samplers never fail. Parameters outside a distribution's domain degrade
//! to a boundary value, usually without consuming entropy:
//!
//! | Sampler | Condition | Result |
//! |---|---|---|
//! | `exponential` | `rate <= 0` | `0.0` |
//! | `poisson`, `poisson_exact` | `mean <= 0` | `0` |
//! | `poisson`, `poisson_exact` | `mean` infinite | `0` |
//! | `weibull` | `lambda <= 0` or `kappa <= 0` | `0.0` |
//! | `weibull2` | `inv_kappa == 0` | `lambda` |
//! | `log_logistic` | `alpha <= 0` or `beta <= 0` | `0.0` |
//! | `time_varying_rate_delay` | `dt <= 0` | `0.0` |
//! | `binomial_*` | `n == 0` or `p <= 0` | `0` |
//! | `binomial_*` | `p >= 1` | `n` |
//! | `gamma_approx` | `mean <= 0` | `0.0` |
//!
//! NaN parameters fall into the first matching "`<= 0`" row.

mod continuous;
mod discrete;

pub use continuous::DEFAULT_CDF_PRECISION;
pub use discrete::{BINOMIAL_EXACT_THRESHOLD, POISSON_EXACT_THRESHOLD};
