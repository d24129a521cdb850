//! Descriptive statistics over a sample sequence
//!
//! ## Conventions
//!
//! - Percentiles use linear interpolation between closest ranks: the k-th
//!   percentile sits at rank `k/100 * (n - 1)` of the sorted samples and is
//!   interpolated between the two neighbouring values. The median is the
//!   50th percentile under the same rule.
//! - Variance and standard deviation are population statistics (divide by
//!   `n`): a session's arrival sequence is complete, not a sample.
//!
//! ```text
//! samples  = [10, 20, 30, 40, 50]
//! p95 rank = 0.95 * 4 = 3.8  ->  40 + 0.8 * (50 - 40) = 48
//! p99 rank = 0.99 * 4 = 3.96 ->  40 + 0.96 * (50 - 40) = 49.6
//! ```

use serde::{Deserialize, Serialize};

/// Summary statistics of one numeric sequence
///
/// A bundle with `count == 0` carries no information; check
/// [`StatsBundle::is_empty`] before reading the numeric fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBundle {
    /// Number of samples
    pub count: usize,
    /// Arithmetic mean
    pub avg: f64,
    /// 50th percentile
    pub median: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Population standard deviation
    pub stddev: f64,
    /// Population variance
    pub variance: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl StatsBundle {
    /// Bundle representing "no data"
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there were no samples to summarize
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Spread between the largest and smallest sample
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Standard deviation relative to the mean (0 when the mean is 0)
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.avg == 0.0 {
            0.0
        } else {
            self.stddev / self.avg
        }
    }
}

/// Summarize a sample sequence
///
/// The input is left untouched; sorting happens on a copy. Calling this twice
/// on the same samples yields bit-identical bundles.
pub fn analyze(samples: &[f64]) -> StatsBundle {
    if samples.is_empty() {
        return StatsBundle::empty();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let last = sorted.len() - 1;
    let min = sorted[0];
    let max = sorted[last];

    // Rounding can push the mean of identical values one ulp past max
    let avg = (samples.iter().sum::<f64>() / n).clamp(min, max);
    let variance = samples.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;

    StatsBundle {
        count: sorted.len(),
        avg,
        median: interpolate(&sorted, last, 50.0),
        min,
        max,
        stddev: variance.sqrt(),
        variance,
        p95: interpolate(&sorted, last, 95.0),
        p99: interpolate(&sorted, last, 99.0),
    }
}

/// Linearly interpolated percentile of an ascending slice
///
/// # Arguments
/// * `sorted` - Samples in ascending order
/// * `k` - Percentile in 0..=100
///
/// # Returns
/// `None` for an empty slice
pub fn percentile(sorted: &[f64], k: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    Some(interpolate(sorted, last, k))
}

/// `last` is the index of the final element of a non-empty `sorted`
fn interpolate(sorted: &[f64], last: usize, k: f64) -> f64 {
    let rank = (k.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(last);
    let fraction = rank - lower as f64;

    let lo = sorted[lower];
    let hi = sorted[upper];
    (lo + (hi - lo) * fraction).clamp(lo, hi)
}
