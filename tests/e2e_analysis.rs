//! E2E tests for interval statistics and the quality verdict
//!
//! Exercises the analysis path through the public API:
//! - `analyze` reference values and ordering guarantees
//! - Interval extraction from a recorded log
//! - Threshold rules and the consistency score

use approx::assert_relative_eq;
use jittertester::stats::intervals::{chunk_sizes, compute_intervals};
use jittertester::stats::quality::assess;
use jittertester::stats::summary::analyze;
use jittertester::{ChunkRecorder, Direction, QualityThresholds};
use std::time::Duration;

/// Recorder holding downstream chunks at the given arrival offsets (ms)
fn recorded(arrivals_ms: &[u64], bytes: usize) -> ChunkRecorder {
    let mut recorder = ChunkRecorder::new(10_000);
    for at in arrivals_ms {
        recorder
            .record(vec![0; bytes], Direction::Downstream, Duration::from_millis(*at))
            .unwrap();
    }
    recorder
}

/// Reference sequence from the analysis documentation
#[test]
fn test_reference_sequence() {
    let stats = analyze(&[10.0, 20.0, 30.0, 40.0, 50.0]);

    assert_eq!(stats.count, 5);
    assert_relative_eq!(stats.avg, 30.0);
    assert_relative_eq!(stats.median, 30.0);
    assert_relative_eq!(stats.min, 10.0);
    assert_relative_eq!(stats.max, 50.0);
    assert_relative_eq!(stats.stddev, 14.142, epsilon = 1e-3);
    assert_relative_eq!(stats.variance, 200.0, epsilon = 1e-9);
    assert_relative_eq!(stats.p95, 48.0, epsilon = 1e-9);
    assert_relative_eq!(stats.p99, 49.6, epsilon = 1e-9);
}

#[test]
fn test_reference_sequence_is_not_jittery() {
    let stats = analyze(&[10.0, 20.0, 30.0, 40.0, 50.0]);
    let sizes = analyze(&[3200.0; 6]);
    let verdict = assess(&stats, &sizes, &QualityThresholds::default());

    assert!(!verdict.high_jitter_warning, "stddev 14.1 and range 40 are within limits");
    assert!(!verdict.irregular_chunk_warning);
    assert_relative_eq!(verdict.consistency_score, 85.858, epsilon = 1e-3);
}

#[test]
fn test_alternating_intervals_flag_jitter() {
    let stats = analyze(&[5.0, 100.0, 5.0, 100.0]);
    let sizes = analyze(&[3200.0; 5]);
    let verdict = assess(&stats, &sizes, &QualityThresholds::default());

    assert!(verdict.high_jitter_warning);
    assert_relative_eq!(stats.stddev, 47.5, epsilon = 1e-9);
    assert_relative_eq!(verdict.consistency_score, 52.5, epsilon = 1e-9);
}

/// Ordering holds for a spread of awkward inputs
#[test]
fn test_ordering_invariants() {
    let inputs: Vec<Vec<f64>> = vec![
        vec![1.0],
        vec![3.0, 1.0],
        vec![0.1, 0.2, 0.3],
        vec![100.0, 0.0, 50.0, 50.0, 99.9, 12.5],
        (0..997).map(|i| ((i * 7919) % 1000) as f64 / 3.0).collect(),
        vec![42.0; 64],
    ];

    for samples in inputs {
        let s = analyze(&samples);
        assert!(s.min <= s.p95 && s.p95 <= s.p99 && s.p99 <= s.max, "{:?}", s);
        assert!(s.min <= s.avg && s.avg <= s.max, "{:?}", s);
        assert!(s.min <= s.median && s.median <= s.max, "{:?}", s);
        assert!(s.stddev >= 0.0 && s.variance >= 0.0);
    }
}

#[test]
fn test_empty_and_single_value() {
    let empty = analyze(&[]);
    assert!(empty.is_empty());

    let single = analyze(&[7.25]);
    for value in [single.avg, single.median, single.min, single.max, single.p95, single.p99] {
        assert_eq!(value, 7.25);
    }
    assert_eq!(single.stddev, 0.0);
    assert_eq!(single.variance, 0.0);
}

#[test]
fn test_analyze_is_idempotent() {
    let samples = [98.7, 101.3, 99.9, 140.2, 60.4, 100.0];
    let first = analyze(&samples);
    let second = analyze(&samples);
    assert_eq!(first.avg.to_bits(), second.avg.to_bits());
    assert_eq!(first.stddev.to_bits(), second.stddev.to_bits());
    assert_eq!(first.p99.to_bits(), second.p99.to_bits());
}

/// Intervals come from consecutive downstream arrivals only
#[test]
fn test_intervals_from_recorded_log() {
    let mut recorder = recorded(&[0, 100, 210, 300], 3200);
    recorder
        .record(vec![1; 1600], Direction::Upstream, Duration::from_millis(150))
        .unwrap();

    let intervals = compute_intervals(recorder.observations());
    assert_eq!(intervals.len(), 3);
    assert_relative_eq!(intervals[0], 100.0, epsilon = 1e-9);
    assert_relative_eq!(intervals[1], 110.0, epsilon = 1e-9);
    assert_relative_eq!(intervals[2], 90.0, epsilon = 1e-9);

    let sizes = chunk_sizes(recorder.observations());
    assert_eq!(sizes, vec![3200.0; 4]);
}

#[test]
fn test_single_chunk_is_not_assessable() {
    let recorder = recorded(&[40], 3200);
    let intervals = compute_intervals(recorder.observations());
    assert!(intervals.is_empty());

    let verdict = assess(
        &analyze(&intervals),
        &analyze(&chunk_sizes(recorder.observations())),
        &QualityThresholds::default(),
    );
    assert!(verdict.insufficient_data);
    assert!(!verdict.has_warnings());
}

#[test]
fn test_irregular_chunk_sizes() {
    let sizes = analyze(&[100.0, 6400.0, 100.0, 6400.0]);
    let intervals = analyze(&[100.0; 3]);
    let verdict = assess(&intervals, &sizes, &QualityThresholds::default());

    assert!(verdict.irregular_chunk_warning);
    assert!(!verdict.high_jitter_warning);
    assert_eq!(verdict.consistency_score, 100.0);
}

/// Stricter thresholds flip the verdict without touching the data
#[test]
fn test_custom_thresholds() {
    let stats = analyze(&[90.0, 110.0, 95.0, 105.0]);
    let sizes = analyze(&[3200.0; 5]);

    let relaxed = assess(&stats, &sizes, &QualityThresholds::default());
    assert!(!relaxed.high_jitter_warning);

    let strict = QualityThresholds {
        jitter_stddev_threshold_ms: 5.0,
        ..QualityThresholds::default()
    };
    assert!(assess(&stats, &sizes, &strict).high_jitter_warning);
}
