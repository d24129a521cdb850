//! Quality verdict from interval and chunk-size statistics
//!
//! The score is a plain linear penalty on interval standard deviation so a
//! reader can recompute it by hand:
//!
//! ```text
//! consistency_score = clamp(100 - stddev / reference_stddev_ms * 100, 0, 100)
//! ```

use super::summary::StatsBundle;
use crate::config::QualityThresholds;
use serde::{Deserialize, Serialize};

/// Outcome of the quality assessment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// Timing regularity, 0 (erratic) to 100 (perfectly regular)
    pub consistency_score: f64,
    /// Interval stddev or range exceeded its threshold
    pub high_jitter_warning: bool,
    /// Chunk size coefficient of variation exceeded its threshold
    pub irregular_chunk_warning: bool,
    /// Not enough data to assess; the other fields carry no information
    pub insufficient_data: bool,
}

impl QualityVerdict {
    /// Verdict for a session without enough data to analyze
    pub fn not_assessable() -> Self {
        Self {
            consistency_score: 0.0,
            high_jitter_warning: false,
            irregular_chunk_warning: false,
            insufficient_data: true,
        }
    }

    /// True when any warning is raised
    pub fn has_warnings(&self) -> bool {
        self.high_jitter_warning || self.irregular_chunk_warning
    }
}

/// Apply threshold rules to interval and chunk-size statistics
///
/// Either bundle being empty yields [`QualityVerdict::not_assessable`].
pub fn assess(
    interval_stats: &StatsBundle,
    size_stats: &StatsBundle,
    thresholds: &QualityThresholds,
) -> QualityVerdict {
    if interval_stats.is_empty() || size_stats.is_empty() {
        tracing::debug!(
            intervals = interval_stats.count,
            sizes = size_stats.count,
            "Insufficient data for quality assessment"
        );
        return QualityVerdict::not_assessable();
    }

    let high_jitter_warning = interval_stats.stddev > thresholds.jitter_stddev_threshold_ms
        || interval_stats.range() > thresholds.jitter_range_threshold_ms;

    let irregular_chunk_warning =
        size_stats.coefficient_of_variation() > thresholds.chunk_cv_threshold;

    let penalty = interval_stats.stddev / thresholds.reference_stddev_ms * 100.0;
    let consistency_score = (100.0 - penalty).clamp(0.0, 100.0);

    QualityVerdict {
        consistency_score,
        high_jitter_warning,
        irregular_chunk_warning,
        insufficient_data: false,
    }
}
