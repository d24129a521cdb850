//! Session artifact persistence
//!
//! Each session leaves a JSON report and, when the service answered with any
//! audio, a WAV of the reconstructed response. Both names share a stem of
//! `<prefix>_<YYYYmmdd_HHMMSS>` taken from the session start in local time.
//! The two files share no data and are written concurrently.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use jittertester_core::report::wav::write_wav;
use jittertester_core::{JitterConfig, JitterReport, SessionOutcome};
use std::path::{Path, PathBuf};

/// Where a session's artifacts ended up
#[derive(Debug, Clone, PartialEq)]
pub struct SessionArtifacts {
    pub report_path: PathBuf,
    pub audio_path: Option<PathBuf>,
    /// Sample frames written to the WAV
    pub audio_frames: u64,
}

/// `<prefix>_<YYYYmmdd_HHMMSS>` for a session started at `started_at`
pub fn artifact_stem(prefix: &str, started_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        prefix,
        started_at.with_timezone(&Local).format("%Y%m%d_%H%M%S")
    )
}

pub fn report_file_name(stem: &str) -> String {
    format!("{}_jitter_report.json", stem)
}

pub fn audio_file_name(stem: &str) -> String {
    format!("{}.wav", stem)
}

/// Write the report and optional audio of a finished session
///
/// The WAV is skipped when `write_audio` is false or no downstream audio was
/// received; the report's `audio_file` names the WAV only when one is written.
pub async fn persist(
    outcome: SessionOutcome,
    config: &JitterConfig,
    write_audio: bool,
) -> Result<(JitterReport, SessionArtifacts)> {
    let SessionOutcome {
        mut report, pcm, ..
    } = outcome;
    let dir = config.output_dir.clone();
    let stem = artifact_stem(&config.file_prefix, report.test_info.timestamp);
    let report_path = dir.join(report_file_name(&stem));

    let audio_path = if write_audio && !pcm.is_empty() {
        let name = audio_file_name(&stem);
        report.set_audio_file(Some(name.clone()));
        Some(dir.join(name))
    } else {
        if pcm.is_empty() {
            tracing::info!("No downstream audio, skipping WAV");
        }
        report.set_audio_file(None);
        None
    };

    let report_task = {
        let report = report.clone();
        let path = report_path.clone();
        tokio::task::spawn_blocking(move || report.save(&path))
    };
    let audio_task = {
        let path = audio_path.clone();
        let format = config.audio;
        tokio::task::spawn_blocking(move || match path {
            Some(path) => write_wav(&path, &pcm, &format).map(Some),
            None => Ok(None),
        })
    };

    let (report_result, audio_result) = tokio::join!(report_task, audio_task);
    report_result
        .context("Report writer task failed")?
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    let audio_frames = audio_result
        .context("Audio writer task failed")?
        .with_context(|| match &audio_path {
            Some(path) => format!("Failed to write audio {}", path.display()),
            None => "Failed to write audio".to_string(),
        })?
        .unwrap_or(0);

    Ok((
        report,
        SessionArtifacts {
            report_path,
            audio_path,
            audio_frames,
        },
    ))
}

/// Load a previously saved report
pub fn load_report(path: &Path) -> Result<JitterReport> {
    JitterReport::load(path).with_context(|| format!("Failed to load report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jittertester_core::{ChunkEvent, Direction, JitterSession};
    use std::time::{Duration, Instant};

    fn finished_session(config: &JitterConfig, chunks: u64) -> SessionOutcome {
        let epoch = Instant::now();
        let mut session = JitterSession::start_at(config.clone(), epoch);
        for i in 0..chunks {
            session
                .handle(ChunkEvent::Audio {
                    direction: Direction::Downstream,
                    payload: vec![0; 320],
                    at: epoch + Duration::from_millis(i * 20),
                })
                .unwrap();
        }
        session
            .handle(ChunkEvent::End {
                at: epoch + Duration::from_millis(chunks * 20),
            })
            .unwrap();
        session.finish()
    }

    #[test]
    fn test_file_names() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let stem = artifact_stem("voice", at);
        assert!(stem.starts_with("voice_2024"));
        assert_eq!(stem.len(), "voice_".len() + 15);
        assert!(report_file_name(&stem).ends_with("_jitter_report.json"));
        assert!(audio_file_name(&stem).ends_with(".wav"));
    }

    #[tokio::test]
    async fn test_persist_writes_report_and_audio() {
        let dir = tempfile::tempdir().unwrap();
        let config = JitterConfig {
            output_dir: dir.path().join("out"),
            ..JitterConfig::default()
        };
        let outcome = finished_session(&config, 4);

        let (report, artifacts) = persist(outcome, &config, true).await.unwrap();
        assert!(artifacts.report_path.exists());
        let audio_path = artifacts.audio_path.unwrap();
        assert!(audio_path.exists());
        assert_eq!(artifacts.audio_frames, 4 * 160);

        let expected_name = audio_path.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(report.test_info.audio_file, Some(expected_name));

        let saved = load_report(&artifacts.report_path).unwrap();
        assert_eq!(saved, report);
    }

    #[tokio::test]
    async fn test_persist_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        let config = JitterConfig {
            output_dir: dir.path().to_path_buf(),
            ..JitterConfig::default()
        };
        let outcome = finished_session(&config, 0);

        let (report, artifacts) = persist(outcome, &config, true).await.unwrap();
        assert!(artifacts.audio_path.is_none());
        assert_eq!(report.test_info.audio_file, None);
        assert!(report.insufficient_data());
        assert!(artifacts.report_path.exists());

        let wavs = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().extension().is_some_and(|x| x == "wav"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(wavs, 0);
    }

    #[tokio::test]
    async fn test_persist_respects_no_audio_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = JitterConfig {
            output_dir: dir.path().to_path_buf(),
            ..JitterConfig::default()
        };
        let outcome = finished_session(&config, 3);

        let (report, artifacts) = persist(outcome, &config, false).await.unwrap();
        assert!(artifacts.audio_path.is_none());
        assert_eq!(artifacts.audio_frames, 0);
        assert_eq!(report.test_info.audio_file, None);
    }
}
