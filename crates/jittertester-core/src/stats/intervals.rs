//! Inter-arrival intervals and chunk sizes
//!
//! Only downstream observations take part: the analysis is about how the
//! service delivers its response, not how fast the trigger was sent.

use crate::capture::observation::Observation;

/// Gaps between consecutive downstream arrivals, in milliseconds
///
/// Out-of-order observations are skipped so a late timestamp can never
/// produce a negative interval. Returns an empty vector when fewer than two
/// downstream observations qualify.
pub fn compute_intervals(log: &[Observation]) -> Vec<f64> {
    let mut intervals = Vec::new();
    let mut previous = None;

    for obs in log.iter().filter(|o| o.is_downstream() && !o.out_of_order) {
        if let Some(prev) = previous {
            let gap = obs.timestamp.saturating_sub(prev);
            intervals.push(gap.as_secs_f64() * 1000.0);
        }
        previous = Some(obs.timestamp);
    }

    intervals
}

/// Downstream chunk sizes in bytes, excluding zero-length payloads
pub fn chunk_sizes(log: &[Observation]) -> Vec<f64> {
    log.iter()
        .filter(|o| o.is_downstream() && !o.is_empty())
        .map(|o| o.len() as f64)
        .collect()
}
