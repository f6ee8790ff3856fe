//! Continuous samplers: Gaussian, exponential, Weibull, log-logistic,
//! time-varying-rate waiting times and the shape-2 gamma approximation.

use crate::rng::RandomStream;

/// Default CDF residual at which [`RandomStream::gamma_approx`] stops
pub const DEFAULT_CDF_PRECISION: f64 = 0.01;

const GAMMA_MAX_ITERATIONS: usize = 64;

/// CDF of a gamma distribution with shape 2 and scale `theta`
fn gamma2_cdf(x: f64, theta: f64) -> f64 {
    let scaled = x / theta;
    1.0 - (scaled + 1.0) * (-scaled).exp()
}

impl RandomStream {
    /// Standard normal deviate (polar rejection method)
    ///
    /// Deviates are produced in pairs. The second of each pair is cached and
    /// returned by the next call without drawing; the cache is part of the
    /// checkpointed state.
    pub fn gaussian(&mut self) -> f64 {
        if let Some(cached) = self.take_pending_gaussian() {
            return cached;
        }

        let (r1, r2, s) = loop {
            let r1 = self.next_unit_double() - 0.5;
            let r2 = self.next_unit_double() - 0.5;
            let s = r1 * r1 + r2 * r2;
            // Unit doubles carry a half-step bit, so s is never exactly 0.
            if s <= 0.25 {
                break (r1, r2, s);
            }
        };

        let rad = -2.0 * self.next_unit_double().ln();
        let norm = (rad / s).sqrt();

        self.stash_pending_gaussian(r1 * norm);
        r2 * norm
    }

    /// Exponential waiting time with the given rate (mean `1 / rate`)
    pub fn exponential(&mut self, rate: f64) -> f64 {
        if !(rate > 0.0) {
            return 0.0;
        }
        -self.next_unit_double().ln() / rate
    }

    /// Weibull deviate with scale `lambda` and shape `kappa`
    pub fn weibull(&mut self, lambda: f64, kappa: f64) -> f64 {
        if !(lambda > 0.0) || !(kappa > 0.0) {
            return 0.0;
        }
        lambda * (-self.next_unit_double().ln()).powf(1.0 / kappa)
    }

    /// Weibull parameterized by the inverse shape
    ///
    /// Takes single-precision arguments and inverts `inv_kappa` in single
    /// precision; regression outputs depend on that rounding. An
    /// `inv_kappa` of zero means no heterogeneity and returns `lambda`.
    pub fn weibull2(&mut self, lambda: f32, inv_kappa: f32) -> f64 {
        if inv_kappa == 0.0 {
            return f64::from(lambda);
        }
        self.weibull(f64::from(lambda), f64::from(1.0f32 / inv_kappa))
    }

    /// Log-logistic deviate with scale `alpha` and shape `beta`
    pub fn log_logistic(&mut self, alpha: f64, beta: f64) -> f64 {
        if !(alpha > 0.0) || !(beta > 0.0) {
            return 0.0;
        }
        let u = self.next_unit_double();
        alpha * (u / (1.0 - u)).powf(1.0 / beta)
    }

    /// Waiting time to the next event of a non-homogeneous Poisson process
    ///
    /// The hazard is piecewise linear between the samples in `rates`, spaced
    /// `dt` apart, plus a constant `baseline`. Each segment's integral is
    /// the trapezoid rule; the segment in which the cumulative hazard passes
    /// the exponential target is inverted linearly. Past the last sample the
    /// hazard stays at `baseline + rates.last()`.
    ///
    /// Returns `f64::INFINITY` when the target is never reached because the
    /// tail hazard is not positive.
    pub fn time_varying_rate_delay(&mut self, rates: &[f64], dt: f64, baseline: f64) -> f64 {
        if !(dt > 0.0) {
            return 0.0;
        }

        let target = -self.next_unit_double().ln();

        let Some(&last) = rates.last() else {
            return if baseline > 0.0 {
                target / baseline
            } else {
                f64::INFINITY
            };
        };

        let mut cumulative = 0.0;
        for (step, pair) in rates.windows(2).enumerate() {
            let segment_rate = pair[0] + 0.5 * (pair[1] - pair[0]) + baseline;
            cumulative += segment_rate * dt;

            if cumulative > target {
                return (step + 1) as f64 * dt - (cumulative - target) / segment_rate;
            }
        }

        let tail_rate = baseline + last;
        if !(tail_rate > 0.0) {
            return f64::INFINITY;
        }
        (rates.len() - 1) as f64 * dt + (target - cumulative) / tail_rate
    }

    /// Gamma deviate with shape 2 and the given mean
    ///
    /// Uses [`DEFAULT_CDF_PRECISION`]; see
    /// [`gamma_approx_with_precision`](Self::gamma_approx_with_precision).
    pub fn gamma_approx(&mut self, mean: f64) -> f64 {
        self.gamma_approx_with_precision(mean, DEFAULT_CDF_PRECISION)
    }

    /// Gamma deviate with shape 2 by secant inversion of the closed-form CDF
    ///
    /// `F(x) = 1 - (x/θ + 1) e^(-x/θ)` with `θ = mean / 2`. Starting from
    /// `x = 0` and `x = mean`, iterates until `|F(x) - u| < precision` for one
    /// unit double `u`. A step that would leave the positive half-line is
    /// replaced by halving the current estimate.
    pub fn gamma_approx_with_precision(&mut self, mean: f64, precision: f64) -> f64 {
        if !(mean > 0.0) {
            return 0.0;
        }

        let theta = mean / 2.0;
        let target = self.next_unit_double();

        let mut x_prev = 0.0;
        let mut f_prev = gamma2_cdf(x_prev, theta) - target;
        let mut x = mean;
        let mut f = gamma2_cdf(x, theta) - target;

        for _ in 0..GAMMA_MAX_ITERATIONS {
            if f.abs() < precision {
                break;
            }

            let slope = (f - f_prev) / (x - x_prev);
            if !(slope > 0.0) || !slope.is_finite() {
                break;
            }

            let mut next = x - f / slope;
            if next <= 0.0 {
                next = x / 2.0;
            }

            x_prev = x;
            f_prev = f;
            x = next;
            f = gamma2_cdf(x, theta) - target;
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use crate::rng::{word_to_unit_double, GeneratorKind, RandomStream};

    fn stream(seed: u64) -> RandomStream {
        RandomStream::with_capacity(GeneratorKind::PseudoDes, seed, 4096)
    }

    #[test]
    fn test_gaussian_second_deviate_is_cached() {
        let mut rng = stream(1);
        let _first = rng.gaussian();
        let cursor = rng.cursor();
        assert!(rng.pending_gaussian().is_some());

        let _second = rng.gaussian();
        assert_eq!(rng.cursor(), cursor, "cached deviate must not draw");
        assert!(rng.pending_gaussian().is_none());
    }

    #[test]
    fn test_gaussian_pair_shares_radius() {
        let mut rng = stream(17);
        let mut reference = rng.clone();

        let first = rng.gaussian();
        let second = rng.gaussian();

        // Replay the rejection loop by hand.
        let (r1, r2, s) = loop {
            let r1 = word_to_unit_double(reference.next_word()) - 0.5;
            let r2 = word_to_unit_double(reference.next_word()) - 0.5;
            let s = r1 * r1 + r2 * r2;
            if s <= 0.25 {
                break (r1, r2, s);
            }
        };
        let rad = -2.0 * word_to_unit_double(reference.next_word()).ln();
        let norm = (rad / s).sqrt();

        assert_eq!(first, r2 * norm);
        assert_eq!(second, r1 * norm);
        assert_eq!(rng.cursor(), reference.cursor());
    }

    #[test]
    fn test_exponential_matches_formula() {
        let mut rng = stream(3);
        let mut reference = rng.clone();

        let value = rng.exponential(2.0);
        let expected = -reference.next_unit_double().ln() / 2.0;
        assert_eq!(value, expected);
    }

    #[test]
    fn test_exponential_mean() {
        let mut rng = stream(5);
        let n = 200_000;
        let mean: f64 = (0..n).map(|_| rng.exponential(0.25)).sum::<f64>() / n as f64;
        assert!((mean - 4.0).abs() < 0.05, "mean {} not near 4", mean);
    }

    #[test]
    fn test_weibull_shape_one_is_exponential() {
        let mut a = stream(8);
        let mut b = stream(8);
        for _ in 0..100 {
            let w = a.weibull(3.0, 1.0);
            let e = b.exponential(1.0 / 3.0);
            assert!((w - e).abs() < 1e-12, "{} vs {}", w, e);
        }
    }

    #[test]
    fn test_weibull2_uses_single_precision_inverse() {
        let mut a = stream(21);
        let mut b = stream(21);

        let value = a.weibull2(0.05, 0.2);
        let expected = b.weibull(f64::from(0.05f32), f64::from(1.0f32 / 0.2f32));
        assert_eq!(value, expected);
    }

    #[test]
    fn test_weibull2_zero_heterogeneity() {
        let mut rng = stream(21);
        assert_eq!(rng.weibull2(7.5, 0.0), 7.5);
        assert!(rng.is_exhausted(), "no draw expected");
    }

    #[test]
    fn test_log_logistic_median_is_alpha() {
        let mut rng = stream(13);
        let n = 100_001;
        let mut values: Vec<f64> = (0..n).map(|_| rng.log_logistic(2.0, 3.0)).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let median = values[n / 2];
        assert!((median - 2.0).abs() < 0.03, "median {} not near 2", median);
    }

    #[test]
    fn test_time_varying_constant_schedule_is_exponential() {
        let mut a = stream(4);
        let mut b = stream(4);

        for _ in 0..200 {
            let delay = a.time_varying_rate_delay(&[0.5, 0.5, 0.5], 1.0, 0.0);
            let expected = b.exponential(0.5);
            assert!((delay - expected).abs() < 1e-9, "{} vs {}", delay, expected);
        }
    }

    #[test]
    fn test_time_varying_inverts_inside_segment() {
        let mut rng = stream(6);
        let mut reference = rng.clone();

        let delay = rng.time_varying_rate_delay(&[0.0, 100.0], 1.0, 0.0);
        let target = -reference.next_unit_double().ln();

        // Segment hazard is 50 per unit time; the event lands where 50 t = target.
        assert!(target < 50.0);
        assert!((delay - target / 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_varying_tail_rate() {
        let mut rng = stream(6);
        let mut reference = rng.clone();

        let delay = rng.time_varying_rate_delay(&[0.0, 0.0], 2.0, 0.0);
        assert_eq!(delay, f64::INFINITY);
        assert_eq!(rng.cursor(), 1);

        let delay = rng.time_varying_rate_delay(&[0.0, 0.0, 3.0], 1.0, 1.0);
        reference.next_word();
        let target = -reference.next_unit_double().ln();
        let expected = if target <= 1.0 {
            target
        } else if target <= 1.0 + 2.5 {
            1.0 + (target - 1.0) / 2.5
        } else {
            2.0 + (target - 3.5) / 4.0
        };
        assert!((delay - expected).abs() < 1e-12, "{} vs {}", delay, expected);
    }

    #[test]
    fn test_time_varying_empty_schedule_uses_baseline() {
        let mut rng = stream(9);
        let mut reference = rng.clone();

        let delay = rng.time_varying_rate_delay(&[], 1.0, 4.0);
        let expected = -reference.next_unit_double().ln() / 4.0;
        assert_eq!(delay, expected);
    }

    #[test]
    fn test_gamma_approx_converges_to_target() {
        let mut rng = stream(10);
        let mut reference = rng.clone();

        let x = rng.gamma_approx_with_precision(6.0, 1e-9);
        let target = reference.next_unit_double();
        let residual = super::gamma2_cdf(x, 3.0) - target;
        assert!(residual.abs() < 1e-9, "residual {}", residual);
        assert!(x > 0.0);
    }

    #[test]
    fn test_gamma_cdf_closed_form() {
        assert_eq!(super::gamma2_cdf(0.0, 1.0), 0.0);
        let expected = 1.0 - 2.0 * (-1.0f64).exp();
        assert!((super::gamma2_cdf(1.0, 1.0) - expected).abs() < 1e-15);
    }

    #[test]
    fn test_degenerate_parameters_do_not_draw() {
        let mut rng = stream(2);

        assert_eq!(rng.exponential(0.0), 0.0);
        assert_eq!(rng.exponential(-1.0), 0.0);
        assert_eq!(rng.exponential(f64::NAN), 0.0);
        assert_eq!(rng.weibull(0.0, 1.0), 0.0);
        assert_eq!(rng.weibull(1.0, -2.0), 0.0);
        assert_eq!(rng.log_logistic(1.0, 0.0), 0.0);
        assert_eq!(rng.time_varying_rate_delay(&[1.0, 2.0], 0.0, 1.0), 0.0);
        assert_eq!(rng.gamma_approx(0.0), 0.0);
        assert_eq!(rng.gamma_approx(-3.0), 0.0);

        assert!(rng.is_exhausted(), "degenerate parameters must not draw");
    }
}
