//! Jitter statistics
//!
//! Runs once over a finished session log:
//! - Inter-arrival intervals and chunk sizes ([`intervals`])
//! - Descriptive statistics with interpolated percentiles ([`summary`])
//! - Threshold-based quality verdict ([`quality`])

pub mod intervals;
pub mod quality;
pub mod summary;
