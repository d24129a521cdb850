//! Jitter report assembly and serialization
//!
//! The report is pure aggregation: every number in it was computed by the
//! statistics module. Millisecond, byte and score values are rounded to two
//! decimal places; statistics that could not be computed are `null`.
//!
//! ## Document shape
//!
//! ```text
//! test_info          - when, how long, how many downstream chunks and bytes
//! timing_analysis    - inter-arrival interval statistics (ms)
//! size_analysis      - downstream chunk size statistics (bytes)
//! quality_assessment - warnings, consistency score, insufficient-data flag
//! ```

use crate::error::JitterError;
use crate::stats::quality::QualityVerdict;
use crate::stats::summary::StatsBundle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Decimal places kept for floating-point report fields
pub const REPORT_DECIMALS: i32 = 2;

/// Round to [`REPORT_DECIMALS`] places
pub fn round_report(value: f64) -> f64 {
    let scale = 10f64.powi(REPORT_DECIMALS);
    (value * scale).round() / scale
}

/// Facts about the session that are not statistics
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// Wall-clock time the session started
    pub started_at: DateTime<Utc>,
    /// Time between session start and end of recording
    pub session_duration: Duration,
    /// Downstream observations recorded (including empty ones)
    pub downstream_chunks: u64,
    /// Downstream payload bytes recorded
    pub downstream_bytes: u64,
    /// Upstream observations recorded
    pub upstream_chunks: u64,
    /// Playback duration of the reconstructed audio
    pub audio_duration_secs: f64,
    /// Text the service produced during the session
    pub text_content: String,
    /// File name of the persisted audio artifact, if any
    pub audio_file: Option<String>,
    /// Recording stopped without an end-of-stream signal
    pub aborted: bool,
}

/// Session summary section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub timestamp: DateTime<Utc>,
    pub total_duration_seconds: f64,
    pub total_chunks: u64,
    pub total_bytes: u64,
    pub session_duration_seconds: f64,
    pub upstream_chunks: u64,
    pub audio_file: Option<String>,
    pub text_content: String,
    #[serde(default)]
    pub aborted: bool,
}

/// Interval statistics section (ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub interval_count: usize,
    pub avg_interval_ms: Option<f64>,
    pub median_interval_ms: Option<f64>,
    pub min_interval_ms: Option<f64>,
    pub max_interval_ms: Option<f64>,
    pub jitter_range_ms: Option<f64>,
    pub std_deviation_ms: Option<f64>,
    pub variance_ms2: Option<f64>,
    pub p95_percentile_ms: Option<f64>,
    pub p99_percentile_ms: Option<f64>,
    #[serde(default)]
    pub intervals_ms: Vec<f64>,
}

/// Chunk size statistics section (bytes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeAnalysis {
    pub chunk_count: usize,
    pub avg_chunk_bytes: Option<f64>,
    pub min_chunk_bytes: Option<u64>,
    pub max_chunk_bytes: Option<u64>,
    pub std_deviation_bytes: Option<f64>,
    pub chunk_size_variation_bytes: Option<u64>,
    #[serde(default)]
    pub chunk_sizes_bytes: Vec<u64>,
}

/// Quality verdict section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub high_jitter_warning: bool,
    pub irregular_chunk_warning: bool,
    pub consistency_score: f64,
    pub insufficient_data: bool,
}

/// Complete jitter report for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterReport {
    pub test_info: TestInfo,
    pub timing_analysis: TimingAnalysis,
    pub size_analysis: SizeAnalysis,
    pub quality_assessment: QualityAssessment,
}

impl JitterReport {
    /// Merge metadata, statistics and verdict into a report
    pub fn build(
        metadata: &SessionMetadata,
        interval_stats: &StatsBundle,
        size_stats: &StatsBundle,
        verdict: &QualityVerdict,
    ) -> Self {
        let test_info = TestInfo {
            timestamp: metadata.started_at,
            total_duration_seconds: round_report(metadata.audio_duration_secs),
            total_chunks: metadata.downstream_chunks,
            total_bytes: metadata.downstream_bytes,
            session_duration_seconds: round_report(metadata.session_duration.as_secs_f64()),
            upstream_chunks: metadata.upstream_chunks,
            audio_file: metadata.audio_file.clone(),
            text_content: metadata.text_content.trim().to_string(),
            aborted: metadata.aborted,
        };

        let timing_analysis = if interval_stats.is_empty() {
            TimingAnalysis::default()
        } else {
            let s = interval_stats;
            TimingAnalysis {
                interval_count: s.count,
                avg_interval_ms: Some(round_report(s.avg)),
                median_interval_ms: Some(round_report(s.median)),
                min_interval_ms: Some(round_report(s.min)),
                max_interval_ms: Some(round_report(s.max)),
                jitter_range_ms: Some(round_report(s.range())),
                std_deviation_ms: Some(round_report(s.stddev)),
                variance_ms2: Some(round_report(s.variance)),
                p95_percentile_ms: Some(round_report(s.p95)),
                p99_percentile_ms: Some(round_report(s.p99)),
                intervals_ms: Vec::new(),
            }
        };

        let size_analysis = if size_stats.is_empty() {
            SizeAnalysis::default()
        } else {
            let s = size_stats;
            SizeAnalysis {
                chunk_count: s.count,
                avg_chunk_bytes: Some(round_report(s.avg)),
                min_chunk_bytes: Some(s.min as u64),
                max_chunk_bytes: Some(s.max as u64),
                std_deviation_bytes: Some(round_report(s.stddev)),
                chunk_size_variation_bytes: Some(s.range() as u64),
                chunk_sizes_bytes: Vec::new(),
            }
        };

        let quality_assessment = QualityAssessment {
            high_jitter_warning: verdict.high_jitter_warning,
            irregular_chunk_warning: verdict.irregular_chunk_warning,
            consistency_score: round_report(verdict.consistency_score),
            insufficient_data: verdict.insufficient_data,
        };

        Self {
            test_info,
            timing_analysis,
            size_analysis,
            quality_assessment,
        }
    }

    /// Attach the raw interval and chunk size sequences
    pub fn with_samples(mut self, intervals_ms: &[f64], chunk_sizes: &[f64]) -> Self {
        self.timing_analysis.intervals_ms = intervals_ms.iter().map(|v| round_report(*v)).collect();
        self.size_analysis.chunk_sizes_bytes = chunk_sizes.iter().map(|v| *v as u64).collect();
        self
    }

    /// Record the file name of the persisted audio artifact
    pub fn set_audio_file(&mut self, name: Option<String>) {
        self.test_info.audio_file = name;
    }

    pub fn insufficient_data(&self) -> bool {
        self.quality_assessment.insufficient_data
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, JitterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, JitterError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the report as JSON, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<(), JitterError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "Jitter report saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, JitterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Log a human-readable summary of the report
    pub fn log_summary(&self) {
        let info = &self.test_info;
        let timing = &self.timing_analysis;
        let quality = &self.quality_assessment;

        tracing::info!(
            chunks = info.total_chunks,
            bytes = info.total_bytes,
            audio_secs = info.total_duration_seconds,
            session_secs = info.session_duration_seconds,
            "Jitter analysis summary"
        );

        if quality.insufficient_data {
            if info.total_chunks == 0 {
                tracing::warn!("No audio response received, nothing to analyze");
            } else {
                tracing::warn!(
                    chunks = info.total_chunks,
                    "Not enough chunks for jitter analysis"
                );
            }
            return;
        }

        tracing::info!(
            avg_ms = ?timing.avg_interval_ms,
            stddev_ms = ?timing.std_deviation_ms,
            range_ms = ?timing.jitter_range_ms,
            min_ms = ?timing.min_interval_ms,
            max_ms = ?timing.max_interval_ms,
            "Interval timing"
        );
        tracing::info!(
            avg_chunk_bytes = ?self.size_analysis.avg_chunk_bytes,
            score = quality.consistency_score,
            "Consistency score {:.1}/100",
            quality.consistency_score
        );

        if quality.high_jitter_warning {
            tracing::warn!(range_ms = ?timing.jitter_range_ms, stddev_ms = ?timing.std_deviation_ms, "High jitter detected");
        }
        if quality.irregular_chunk_warning {
            tracing::warn!(
                variation_bytes = ?self.size_analysis.chunk_size_variation_bytes,
                "Irregular chunk sizes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityThresholds;
    use crate::stats::quality::assess;
    use crate::stats::summary::analyze;

    fn metadata(chunks: u64, bytes: u64) -> SessionMetadata {
        SessionMetadata {
            started_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            session_duration: Duration::from_millis(5250),
            downstream_chunks: chunks,
            downstream_bytes: bytes,
            upstream_chunks: 12,
            audio_duration_secs: bytes as f64 / 32000.0,
            text_content: "  Hello there.  ".to_string(),
            audio_file: None,
            aborted: false,
        }
    }

    fn sample_report() -> JitterReport {
        let intervals = [10.0, 20.0, 30.0, 40.0, 50.0];
        let sizes = [3200.0, 3200.0, 1600.0, 3200.0, 3200.0, 3200.0];
        let interval_stats = analyze(&intervals);
        let size_stats = analyze(&sizes);
        let verdict = assess(&interval_stats, &size_stats, &QualityThresholds::default());
        JitterReport::build(&metadata(6, 17600), &interval_stats, &size_stats, &verdict)
            .with_samples(&intervals, &sizes)
    }

    #[test]
    fn test_round_report() {
        assert_eq!(round_report(14.142135623730951), 14.14);
        assert_eq!(round_report(49.6), 49.6);
        assert_eq!(round_report(85.85786437626905), 85.86);
    }

    #[test]
    fn test_build_populates_sections() {
        let report = sample_report();
        assert_eq!(report.test_info.total_chunks, 6);
        assert_eq!(report.test_info.total_bytes, 17600);
        assert_eq!(report.test_info.total_duration_seconds, 0.55);
        assert_eq!(report.test_info.session_duration_seconds, 5.25);
        assert_eq!(report.test_info.text_content, "Hello there.");
        assert_eq!(report.timing_analysis.avg_interval_ms, Some(30.0));
        assert_eq!(report.timing_analysis.jitter_range_ms, Some(40.0));
        assert_eq!(report.timing_analysis.std_deviation_ms, Some(14.14));
        assert_eq!(report.timing_analysis.p95_percentile_ms, Some(48.0));
        assert_eq!(report.timing_analysis.p99_percentile_ms, Some(49.6));
        assert_eq!(report.size_analysis.min_chunk_bytes, Some(1600));
        assert_eq!(report.size_analysis.max_chunk_bytes, Some(3200));
        assert_eq!(report.size_analysis.chunk_size_variation_bytes, Some(1600));
        assert_eq!(report.size_analysis.chunk_sizes_bytes.len(), 6);
        assert!(!report.quality_assessment.high_jitter_warning);
        assert!(!report.insufficient_data());
    }

    #[test]
    fn test_empty_statistics_serialize_as_null() {
        let report = JitterReport::build(
            &metadata(0, 0),
            &StatsBundle::empty(),
            &StatsBundle::empty(),
            &QualityVerdict::not_assessable(),
        );
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["test_info"]["total_chunks"], 0);
        assert!(value["timing_analysis"]["avg_interval_ms"].is_null());
        assert!(value["size_analysis"]["avg_chunk_bytes"].is_null());
        assert_eq!(value["quality_assessment"]["insufficient_data"], true);
        assert_eq!(value["quality_assessment"]["consistency_score"], 0.0);
    }

    #[test]
    fn test_document_groups_and_keys() {
        let value: serde_json::Value =
            serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();
        for key in ["timestamp", "total_duration_seconds", "total_chunks", "total_bytes"] {
            assert!(value["test_info"].get(key).is_some(), "missing test_info.{}", key);
        }
        for key in [
            "avg_interval_ms",
            "median_interval_ms",
            "min_interval_ms",
            "max_interval_ms",
            "jitter_range_ms",
            "std_deviation_ms",
            "variance_ms2",
            "p95_percentile_ms",
            "p99_percentile_ms",
        ] {
            assert!(value["timing_analysis"].get(key).is_some(), "missing timing_analysis.{}", key);
        }
        for key in ["avg_chunk_bytes", "min_chunk_bytes", "max_chunk_bytes", "std_deviation_bytes"] {
            assert!(value["size_analysis"].get(key).is_some(), "missing size_analysis.{}", key);
        }
        for key in ["high_jitter_warning", "irregular_chunk_warning", "consistency_score"] {
            assert!(value["quality_assessment"].get(key).is_some(), "missing quality_assessment.{}", key);
        }
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let report = sample_report();
        let parsed = JitterReport::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report.json");
        let mut report = sample_report();
        report.set_audio_file(Some("session.wav".to_string()));
        report.save(&path).unwrap();

        let loaded = JitterReport::load(&path).unwrap();
        assert_eq!(loaded.test_info.audio_file.as_deref(), Some("session.wav"));
        assert_eq!(loaded, report);
    }
}
