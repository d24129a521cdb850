//! Jittertester - measure delivery jitter of a streaming audio service
//!
//! Drives one jitter session from a recorded trace or a simulated service,
//! then writes the JSON report and reconstructed audio.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jittertester::output::{load_report, persist};
use jittertester::source::synthetic::{load_trigger, silent_trigger_secs};
use jittertester::source::trace::{load_trace, replay, TraceEntry};
use jittertester::source::{
    install_interrupt_handler, running_flag, RunningFlag, SourceSummary, SyntheticConfig,
    SyntheticService,
};
use jittertester::{JitterConfig, SessionHandle};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Jitter analysis for streaming audio responses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to the per-user config, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for reports and audio
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Prefix of output file names
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Skip writing the reconstructed WAV
    #[arg(long, global = true)]
    no_audio: bool,

    /// Interval stddev (ms) above which jitter is flagged
    #[arg(long, global = true)]
    stddev_threshold_ms: Option<f64>,

    /// Interval range (ms) above which jitter is flagged
    #[arg(long, global = true)]
    range_threshold_ms: Option<f64>,

    /// Chunk size coefficient of variation above which sizes are flagged
    #[arg(long, global = true)]
    chunk_cv_threshold: Option<f64>,

    /// Abort the session if it has not ended after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines trace into a session
    Replay {
        trace: PathBuf,
        /// Pace events by their recorded offsets
        #[arg(long)]
        realtime: bool,
    },
    /// Run against a simulated streaming service
    Simulate {
        /// Trigger utterance (.wav or raw PCM); silence when omitted
        #[arg(long)]
        trigger: Option<PathBuf>,
        /// Length of the silent trigger
        #[arg(long, default_value = "2.0")]
        trigger_secs: f64,
        /// Response chunks to send
        #[arg(long, default_value = "50")]
        chunks: usize,
        #[arg(long, default_value = "3200")]
        chunk_bytes: usize,
        /// Nominal response chunk spacing
        #[arg(long, default_value = "100")]
        interval_ms: f64,
        /// Maximum deviation from the nominal spacing
        #[arg(long, default_value = "15")]
        jitter_ms: f64,
        #[arg(long)]
        seed: Option<u32>,
        /// Transcript to stream alongside the audio
        #[arg(long)]
        text: Option<String>,
    },
    /// Print the summary of a saved report
    Summarize { report: PathBuf },
    /// Show the effective configuration
    Config {
        /// Save it to the config file
        #[arg(long)]
        write: bool,
    },
}

enum Source {
    Trace {
        entries: Vec<TraceEntry>,
        realtime: bool,
    },
    Synthetic {
        service: Box<SyntheticService>,
        trigger: Vec<u8>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jittertester=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!(
        version = jittertester::VERSION,
        build_date = jittertester::BUILD_DATE,
        "Jittertester starting"
    );

    let config = resolve_config(&cli)?;

    match &cli.command {
        Command::Replay { trace, realtime } => {
            let entries = load_trace(trace)
                .with_context(|| format!("Failed to read trace {}", trace.display()))?;
            let source = Source::Trace {
                entries,
                realtime: *realtime,
            };
            run(&cli, config, source).await
        }
        Command::Simulate {
            trigger,
            trigger_secs,
            chunks,
            chunk_bytes,
            interval_ms,
            jitter_ms,
            seed,
            text,
        } => {
            let trigger = match trigger {
                Some(path) => load_trigger(path, &config.audio)
                    .with_context(|| format!("Failed to load trigger {}", path.display()))?,
                None => silent_trigger_secs(*trigger_secs, &config.audio)
                    .context("Invalid --trigger-secs")?,
            };
            let synthetic = SyntheticConfig {
                response_chunks: *chunks,
                chunk_bytes: *chunk_bytes,
                interval_ms: *interval_ms,
                jitter_ms: *jitter_ms,
                text: text.clone(),
                seed: seed.unwrap_or(jittertester::source::synthetic::DEFAULT_SEED),
                ..SyntheticConfig::default()
            };
            synthetic
                .validate()
                .context("Invalid simulation timing")?;
            let service = Box::new(SyntheticService::new(synthetic, config.audio));
            run(&cli, config, Source::Synthetic { service, trigger }).await
        }
        Command::Summarize { report } => {
            let loaded = load_report(report)?;
            info!(path = %report.display(), "Loaded report");
            loaded.log_summary();
            Ok(())
        }
        Command::Config { write } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if *write {
                let path = cli.config.clone().unwrap_or_else(JitterConfig::path);
                config
                    .save(&path)
                    .with_context(|| format!("Failed to save config to {}", path.display()))?;
            }
            Ok(())
        }
    }
}

/// Config file plus command-line overrides
fn resolve_config(cli: &Cli) -> Result<JitterConfig> {
    let mut config = match &cli.config {
        Some(path) => JitterConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => JitterConfig::load(),
    };

    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(prefix) = &cli.prefix {
        config.file_prefix = prefix.clone();
    }
    if let Some(v) = cli.stddev_threshold_ms {
        config.thresholds.jitter_stddev_threshold_ms = v;
    }
    if let Some(v) = cli.range_threshold_ms {
        config.thresholds.jitter_range_threshold_ms = v;
    }
    if let Some(v) = cli.chunk_cv_threshold {
        config.thresholds.chunk_cv_threshold = v;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(cli: &Cli, config: JitterConfig, source: Source) -> Result<()> {
    let running = running_flag();
    install_interrupt_handler(&running);

    let handle = SessionHandle::spawn(config.clone());
    let sender = handle.sender();

    let drive = drive_source(source, &sender, &running);
    let summary = match cli.timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), drive).await {
            Ok(summary) => summary,
            Err(_) => {
                warn!(timeout_secs = secs, "Session timed out, aborting");
                SourceSummary {
                    interrupted: true,
                    ..SourceSummary::default()
                }
            }
        },
        None => drive.await,
    };
    // Dropping the last sender finishes the session even without an end event
    drop(sender);

    if summary.interrupted || !running.load(Ordering::SeqCst) {
        warn!(events = summary.events_sent, "Source stopped early, report will be marked aborted");
    }

    let outcome = handle.finish().await.context("Jitter session failed")?;
    let (report, artifacts) = persist(outcome, &config, !cli.no_audio).await?;

    report.log_summary();
    info!(path = %artifacts.report_path.display(), "Report written");
    if let Some(audio) = &artifacts.audio_path {
        info!(path = %audio.display(), frames = artifacts.audio_frames, "Audio written");
    }
    Ok(())
}

async fn drive_source(
    source: Source,
    sender: &jittertester::EventSender,
    running: &RunningFlag,
) -> SourceSummary {
    match source {
        Source::Trace { entries, realtime } => replay(&entries, sender, realtime, running).await,
        Source::Synthetic {
            mut service,
            trigger,
        } => service.run(&trigger, sender, running).await,
    }
}
