//! E2E tests for the command-line pipeline
//!
//! Source -> session thread -> persisted artifacts, without the binary:
//! - Trace files replayed from disk
//! - The synthetic service with a WAV trigger
//! - Report and WAV written side by side

use jittertester::output::{load_report, persist};
use jittertester::report::wav::write_wav;
use jittertester::source::synthetic::load_trigger;
use jittertester::source::trace::load_trace;
use jittertester::source::{running_flag, trace, SyntheticConfig, SyntheticService};
use jittertester::{AudioFormat, JitterConfig, SessionHandle};
use std::io::Write;

fn write_trace(dir: &std::path::Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("session.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    path
}

#[tokio::test]
async fn test_trace_replay_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let trace_path = write_trace(
        dir.path(),
        &[
            r#"{"t_ms": 0, "kind": "start"}"#,
            r#"{"t_ms": 0, "kind": "audio", "direction": "upstream", "len": 1600}"#,
            r#"{"t_ms": 100, "kind": "audio", "direction": "upstream", "len": 1600}"#,
            r#"{"t_ms": 600, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 700, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 760, "kind": "text", "text": "Sure,"}"#,
            r#"{"t_ms": 800, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 910, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 960, "kind": "text", "text": " go ahead."}"#,
            r#"{"t_ms": 1200, "kind": "end"}"#,
        ],
    );
    let config = JitterConfig {
        output_dir: dir.path().join("reports"),
        file_prefix: "replay".into(),
        ..JitterConfig::default()
    };

    let entries = load_trace(&trace_path).unwrap();
    let handle = SessionHandle::spawn(config.clone());
    let sender = handle.sender();
    let summary = trace::replay(&entries, &sender, false, &running_flag()).await;
    drop(sender);
    assert_eq!(summary.events_sent, 10);

    let outcome = handle.finish().await.unwrap();
    let (report, artifacts) = persist(outcome, &config, true).await.unwrap();

    assert_eq!(report.test_info.total_chunks, 4);
    assert_eq!(report.test_info.upstream_chunks, 2);
    assert_eq!(report.test_info.text_content, "Sure, go ahead.");
    assert_eq!(report.timing_analysis.intervals_ms, vec![100.0, 100.0, 110.0]);
    assert_eq!(report.timing_analysis.jitter_range_ms, Some(10.0));
    assert!(!report.quality_assessment.high_jitter_warning);

    let name = artifacts
        .report_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert!(name.starts_with("replay_"));
    assert!(name.ends_with("_jitter_report.json"));

    let wav_path = artifacts.audio_path.unwrap();
    let reader = hound::WavReader::open(&wav_path).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.len(), 4 * 1600);

    assert_eq!(load_report(&artifacts.report_path).unwrap(), report);
}

#[tokio::test]
async fn test_jittery_trace_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let trace_path = write_trace(
        dir.path(),
        &[
            r#"{"t_ms": 0, "kind": "start"}"#,
            r#"{"t_ms": 0, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 5, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 105, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 110, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 210, "kind": "audio", "direction": "downstream", "len": 3200}"#,
            r#"{"t_ms": 300, "kind": "end"}"#,
        ],
    );

    let entries = load_trace(&trace_path).unwrap();
    let handle = SessionHandle::spawn(JitterConfig::default());
    trace::replay(&entries, &handle.sender(), false, &running_flag()).await;
    let outcome = handle.finish().await.unwrap();

    let report = outcome.report;
    assert_eq!(report.timing_analysis.intervals_ms, vec![5.0, 100.0, 5.0, 100.0]);
    assert!(report.quality_assessment.high_jitter_warning);
    assert_eq!(report.timing_analysis.std_deviation_ms, Some(47.5));
}

#[tokio::test]
async fn test_synthetic_service_with_wav_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let format = AudioFormat::default();
    let trigger_pcm = vec![0u8; 3 * 1600];
    let trigger_path = dir.path().join("trigger.wav");
    write_wav(&trigger_path, &trigger_pcm, &format).unwrap();

    let trigger = load_trigger(&trigger_path, &format).unwrap();
    assert_eq!(trigger.len(), trigger_pcm.len());

    let mut service = SyntheticService::new(
        SyntheticConfig {
            response_chunks: 8,
            chunk_bytes: 640,
            interval_ms: 4.0,
            jitter_ms: 1.0,
            response_delay_ms: 1,
            trigger_interval_ms: 1,
            ..SyntheticConfig::default()
        },
        format,
    );
    let config = JitterConfig {
        output_dir: dir.path().to_path_buf(),
        ..JitterConfig::default()
    };
    let handle = SessionHandle::spawn(config.clone());
    let summary = service.run(&trigger, &handle.sender(), &running_flag()).await;
    assert!(!summary.interrupted);

    let outcome = handle.finish().await.unwrap();
    assert_eq!(outcome.report.test_info.total_chunks, 8);
    assert_eq!(outcome.report.test_info.upstream_chunks, 3);
    assert_eq!(outcome.report.timing_analysis.interval_count, 7);

    let (_, artifacts) = persist(outcome, &config, true).await.unwrap();
    assert_eq!(artifacts.audio_frames, 8 * 320);
}
