//! Poisson most-probable-number model for a two-volume well tray.
//!
//! A well of volume `v` is positive with probability `1 - exp(-lambda * v)`,
//! where `lambda` is the organism density per mL.

/// chi-squared(1) 0.95 quantile (profile-likelihood 95% interval).
const CHI2_1_95: f64 = 3.841_458_820_694_124;
/// -ln(0.025): exact one-sided 97.5% bound for a zero count.
const ZERO_COUNT_UPPER: f64 = 3.688_879_454_113_936;
const LAMBDA_MIN: f64 = 1e-9;
const LAMBDA_MAX: f64 = 1e6;
const BISECT_ITERS: usize = 200;

/// Well volumes and counts; densities are reported per `report_volume_ml`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolumeModel {
    pub large_wells: u32,
    pub large_volume_ml: f64,
    pub small_wells: u32,
    pub small_volume_ml: f64,
    pub report_volume_ml: f64,
}

impl VolumeModel {
    /// Quanti-Tray/2000: 49 large and 48 x 0.16 mL small wells sharing a
    /// 100 mL sample, per 100 mL. These volumes reproduce the published
    /// point estimates (e.g. 1986.3 for 49 large + 46 small).
    pub const QUANTI_TRAY_2000: Self = Self {
        large_wells: 49,
        large_volume_ml: 1.884,
        small_wells: 48,
        small_volume_ml: 0.16,
        report_volume_ml: 100.0,
    };

    fn negative_volume(&self, large: u32, small: u32) -> f64 {
        (self.large_wells - large) as f64 * self.large_volume_ml
            + (self.small_wells - small) as f64 * self.small_volume_ml
    }

    /// Log-likelihood of `(large, small)` positives at density `lambda` per mL.
    pub fn log_likelihood(&self, large: u32, small: u32, lambda: f64) -> f64 {
        // ln(1 - exp(-t)) without cancellation
        let ln_pos = |t: f64| (-(-t).exp_m1()).ln();
        let mut ll = -lambda * self.negative_volume(large, small);
        if large > 0 {
            ll += large as f64 * ln_pos(lambda * self.large_volume_ml);
        }
        if small > 0 {
            ll += small as f64 * ln_pos(lambda * self.small_volume_ml);
        }
        ll
    }

    /// d/dlambda of the log-likelihood; strictly decreasing in `lambda`.
    fn score(&self, large: u32, small: u32, lambda: f64) -> f64 {
        let term = |n: u32, v: f64| {
            if n == 0 {
                0.0
            } else {
                n as f64 * v / (lambda * v).exp_m1()
            }
        };
        term(large, self.large_volume_ml) + term(small, self.small_volume_ml)
            - self.negative_volume(large, small)
    }

    fn is_saturated(&self, large: u32, small: u32) -> bool {
        large >= self.large_wells && small >= self.small_wells
    }

    /// Maximum-likelihood density per mL. `Some(0)` with no positives,
    /// `None` when every well is positive (unbounded).
    pub fn mle(&self, large: u32, small: u32) -> Option<f64> {
        if large + small == 0 {
            return Some(0.0);
        }
        if self.is_saturated(large, small) {
            return None;
        }
        Some(bisect_log(LAMBDA_MIN, LAMBDA_MAX, |l| self.score(large, small, l) > 0.0))
    }

    /// Profile-likelihood 95% interval for the density per mL. The upper end
    /// is `None` when unbounded. With no positives the upper end is the exact
    /// zero-count bound over the whole sample volume.
    pub fn interval(&self, large: u32, small: u32) -> (f64, Option<f64>) {
        let half = 0.5 * CHI2_1_95;
        match self.mle(large, small) {
            Some(mle) if mle == 0.0 => {
                let total = self.negative_volume(0, 0);
                (0.0, Some(ZERO_COUNT_UPPER / total))
            }
            Some(mle) => {
                let target = self.log_likelihood(large, small, mle) - half;
                let ll = |l: f64| self.log_likelihood(large, small, l);
                let lower = bisect_log(LAMBDA_MIN, mle, |l| ll(l) < target);
                let upper = bisect_log(mle, LAMBDA_MAX, |l| ll(l) >= target);
                (lower, Some(upper))
            }
            None => {
                // Saturated: ll increases towards 0 as lambda grows.
                let lower = bisect_log(LAMBDA_MIN, LAMBDA_MAX, |l| {
                    self.log_likelihood(large, small, l) < -half
                });
                (lower, None)
            }
        }
    }

    /// Convert a density per mL to the reporting volume.
    pub fn per_report_volume(&self, lambda_per_ml: f64) -> f64 {
        lambda_per_ml * self.report_volume_ml
    }
}

/// Bisection in log space for the boundary where `below` switches from true
/// to false on `[lo, hi]`.
fn bisect_log(lo: f64, hi: f64, below: impl Fn(f64) -> bool) -> f64 {
    let (mut a, mut b) = (lo.max(LAMBDA_MIN).ln(), hi.max(LAMBDA_MIN).ln());
    for _ in 0..BISECT_ITERS {
        let m = 0.5 * (a + b);
        if below(m.exp()) {
            a = m;
        } else {
            b = m;
        }
        if b - a < 1e-13 {
            break;
        }
    }
    (0.5 * (a + b)).exp()
}
