//! Discrete samplers: Poisson, binomial and multinomial counts
//!
//! The approximate samplers switch algorithm at fixed breakpoints:
//!
//! - `poisson` simulates arrivals below a mean of
//!   [`POISSON_EXACT_THRESHOLD`] and uses a Gaussian approximation above it.
//! - `binomial_approx` runs individual trials below
//!   [`BINOMIAL_EXACT_THRESHOLD`] and uses a Gaussian approximation above it.
//! - `binomial_approx2` additionally uses a Poisson approximation when the
//!   smaller tail probability is so small that the Gaussian's symmetric
//!   tails would be visibly wrong.
//!
//! Gaussian-approximated counts are rounded half-up and clamped to the
//! support.

use crate::rng::RandomStream;

/// Mean below which `poisson` simulates arrivals exactly
pub const POISSON_EXACT_THRESHOLD: f64 = 10.0;

/// Trial count below which the binomial approximations run every trial
pub const BINOMIAL_EXACT_THRESHOLD: u64 = 10;

/// Round half-up a Gaussian-approximated count, clamping negatives to 0
#[inline]
fn rounded_count(value: f64) -> u64 {
    let shifted = value + 0.5;
    if shifted < 0.0 {
        0
    } else {
        shifted as u64
    }
}

/// Resolve the degenerate binomial cases that need no draw
#[inline]
fn binomial_boundary(n: u64, p: f64) -> Option<u64> {
    if n == 0 || !(p > 0.0) {
        Some(0)
    } else if p >= 1.0 {
        Some(n)
    } else {
        None
    }
}

impl RandomStream {
    /// Poisson count, exact for small means and Gaussian-approximated above
    pub fn poisson(&mut self, mean: f64) -> u64 {
        if !(mean > 0.0 && mean.is_finite()) {
            return 0;
        }
        if mean < POISSON_EXACT_THRESHOLD {
            return self.poisson_exact(mean);
        }
        rounded_count(self.gaussian() * mean.sqrt() + mean)
    }

    /// Poisson count by simulating exponential inter-arrival gaps
    ///
    /// Draws one unit float per arrival plus one for the gap that crosses
    /// the end of the unit interval. Cost grows linearly with the mean.
    /// An infinite mean would never cross the end and yields 0 instead.
    pub fn poisson_exact(&mut self, mean: f64) -> u64 {
        if !(mean > 0.0 && mean.is_finite()) {
            return 0;
        }

        let mut events = 0;
        let mut elapsed = 0.0;
        loop {
            elapsed += -f64::from(self.next_unit()).ln() / mean;
            if elapsed >= 1.0 {
                return events;
            }
            events += 1;
        }
    }

    /// Sum of `n` independent Bernoulli(`p`) trials, one unit float each
    pub fn binomial_exact(&mut self, n: u64, p: f64) -> u64 {
        if let Some(count) = binomial_boundary(n, p) {
            return count;
        }
        self.binomial_trials(n, p)
    }

    /// Binomial count, Gaussian-approximated for `n >= 10`
    pub fn binomial_approx(&mut self, n: u64, p: f64) -> u64 {
        if let Some(count) = binomial_boundary(n, p) {
            return count;
        }
        if n < BINOMIAL_EXACT_THRESHOLD {
            return self.binomial_trials(n, p);
        }
        self.binomial_gaussian(n, p)
    }

    /// Binomial count with a Poisson branch near `p = 0` and `p = 1`
    ///
    /// With `tail = min(p, 1 - p)`, the Poisson approximation of the tail
    /// count is used when `n < 9 (1 - tail) / tail`; the count is mirrored
    /// back for `p > 0.5`. Otherwise behaves like `binomial_approx`.
    pub fn binomial_approx2(&mut self, n: u64, p: f64) -> u64 {
        if let Some(count) = binomial_boundary(n, p) {
            return count;
        }
        if n < BINOMIAL_EXACT_THRESHOLD {
            return self.binomial_trials(n, p);
        }

        let tail = p.min(1.0 - p);
        if (n as f64) < 9.0 * (1.0 - tail) / tail {
            let count = self.poisson(n as f64 * tail).min(n);
            return if p > 0.5 { n - count } else { count };
        }
        self.binomial_gaussian(n, p)
    }

    /// Split `n` items across categories with the given fractions
    ///
    /// Each category is a `binomial_approx` draw against the items not yet
    /// allocated, with its fraction renormalized by the probability mass not
    /// yet allocated. Once the fractions seen so far reach 1, the remaining
    /// categories get 0 without drawing. The counts never sum past `n`.
    pub fn multinomial_approx(&mut self, n: u64, fractions: &[f64]) -> Vec<u64> {
        let mut allocated = 0u64;
        let mut cumulative = 0.0;

        fractions
            .iter()
            .map(|&fraction| {
                let count = if cumulative < 1.0 {
                    self.binomial_approx(n - allocated, fraction / (1.0 - cumulative))
                } else {
                    0
                };
                cumulative += fraction;
                allocated += count;
                count
            })
            .collect()
    }

    fn binomial_trials(&mut self, n: u64, p: f64) -> u64 {
        let mut successes = 0;
        for _ in 0..n {
            if f64::from(self.next_unit()) < p {
                successes += 1;
            }
        }
        successes
    }

    fn binomial_gaussian(&mut self, n: u64, p: f64) -> u64 {
        let trials = n as f64;
        let std_dev = (trials * p * (1.0 - p)).sqrt();
        rounded_count(self.gaussian() * std_dev + trials * p).min(n)
    }
}
