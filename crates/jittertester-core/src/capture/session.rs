//! One jitter measurement session
//!
//! A session owns its log from start to finish; nothing is shared between
//! sessions apart from the read-only configuration.
//!
//! ```text
//! Idle --start()--> Recording --finish()--> Analyzing --> ReportReady
//! ```
//!
//! [`JitterSession::finish`] consumes the session, so a finished session
//! can never go back to recording.

use super::observation::{ChunkEvent, Direction, Observation};
use super::recorder::ChunkRecorder;
use crate::config::JitterConfig;
use crate::error::JitterError;
use crate::report::builder::{JitterReport, SessionMetadata};
use crate::report::wav::reconstruct_pcm;
use crate::stats::intervals::{chunk_sizes, compute_intervals};
use crate::stats::quality::assess;
use crate::stats::summary::analyze;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the stream to start
    #[default]
    Idle,
    /// Collecting chunks
    Recording,
    /// Computing statistics over the finished log
    Analyzing,
    /// Report built; terminal
    ReportReady,
}

/// Whether the event stream continues after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    End,
}

/// Count of every event delivered to a session, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTally {
    pub start: u64,
    pub upstream_audio: u64,
    pub downstream_audio: u64,
    pub text: u64,
    pub end: u64,
    /// Events that arrived outside the recording window (before start, duplicate start)
    pub ignored: u64,
}

impl EventTally {
    pub fn total(&self) -> u64 {
        self.start + self.upstream_audio + self.downstream_audio + self.text + self.end + self.ignored
    }
}

/// Everything a finished session produces
#[derive(Debug)]
pub struct SessionOutcome {
    /// Structured jitter report
    pub report: JitterReport,
    /// Downstream payloads concatenated in arrival order
    pub pcm: Vec<u8>,
    /// The complete session log
    pub observations: Vec<Observation>,
    /// Events seen by the session
    pub tally: EventTally,
    /// Final lifecycle state (always [`SessionState::ReportReady`])
    pub state: SessionState,
}

/// Jitter measurement session
#[derive(Debug)]
pub struct JitterSession {
    config: JitterConfig,
    recorder: ChunkRecorder,
    state: SessionState,
    /// Wall-clock start, for the report
    started_at: DateTime<Utc>,
    /// Monotonic start; observation timestamps are offsets from here
    epoch: Instant,
    /// Offset of the end-of-stream signal, if one arrived
    ended: Option<Duration>,
    text: String,
    tally: EventTally,
}

impl JitterSession {
    /// Start recording now
    pub fn start(config: JitterConfig) -> Self {
        Self::start_at(config, Instant::now())
    }

    /// Start recording with an explicit monotonic epoch
    ///
    /// Used when the collaborator captured the start of the stream itself.
    pub fn start_at(config: JitterConfig, epoch: Instant) -> Self {
        let recorder = ChunkRecorder::new(config.max_observations);
        tracing::info!(
            from = ?SessionState::Idle,
            to = ?SessionState::Recording,
            limit = config.max_observations,
            "Session started"
        );
        Self {
            config,
            recorder,
            state: SessionState::Recording,
            started_at: Utc::now(),
            epoch,
            ended: None,
            text: String::new(),
            tally: EventTally {
                start: 1,
                ..EventTally::default()
            },
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read-only view of the log so far
    pub fn recorder(&self) -> &ChunkRecorder {
        &self.recorder
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    /// Events seen so far
    pub fn tally(&self) -> EventTally {
        self.tally
    }

    /// Count events that were dropped before this session started
    pub fn add_ignored(&mut self, count: u64) {
        self.tally.ignored += count;
    }

    /// Record a chunk received at `at`
    pub fn record(
        &mut self,
        payload: Vec<u8>,
        direction: Direction,
        at: Instant,
    ) -> Result<(), JitterError> {
        self.record_offset(payload, direction, at.saturating_duration_since(self.epoch))
    }

    /// Record a chunk at an offset from the session start
    pub fn record_offset(
        &mut self,
        payload: Vec<u8>,
        direction: Direction,
        offset: Duration,
    ) -> Result<(), JitterError> {
        match direction {
            Direction::Upstream => self.tally.upstream_audio += 1,
            Direction::Downstream => self.tally.downstream_audio += 1,
        }
        self.recorder.record(payload, direction, offset)
    }

    /// Append a text fragment produced by the service
    pub fn push_text(&mut self, text: &str) {
        self.tally.text += 1;
        tracing::debug!(text, "text_received");
        self.text.push_str(text);
    }

    /// Mark the end of the stream at `at`
    pub fn end(&mut self, at: Instant) {
        self.tally.end += 1;
        self.ended = Some(at.saturating_duration_since(self.epoch));
    }

    /// Dispatch one collaborator event
    ///
    /// # Errors
    /// Only [`JitterError::ResourceExhausted`]; the session must then be dropped.
    pub fn handle(&mut self, event: ChunkEvent) -> Result<Flow, JitterError> {
        match event {
            ChunkEvent::Start { .. } => {
                self.tally.ignored += 1;
                tracing::warn!("Duplicate start event ignored");
            }
            ChunkEvent::Audio {
                direction,
                payload,
                at,
            } => self.record(payload, direction, at)?,
            ChunkEvent::Text(text) => self.push_text(&text),
            ChunkEvent::End { at } => {
                self.end(at);
                return Ok(Flow::End);
            }
        }
        Ok(Flow::Continue)
    }

    /// End recording, analyze the log and build the report
    ///
    /// A session that never received an end-of-stream signal is reported as
    /// aborted; it still yields a complete (possibly empty) report.
    pub fn finish(self) -> SessionOutcome {
        let aborted = self.ended.is_none();
        let last_arrival = self
            .recorder
            .observations()
            .iter()
            .map(|o| o.timestamp)
            .max()
            .unwrap_or_default();
        let session_duration = self
            .ended
            .unwrap_or_else(|| self.epoch.elapsed())
            .max(last_arrival);

        tracing::info!(
            from = ?self.state,
            to = ?SessionState::Analyzing,
            observations = self.recorder.len(),
            aborted,
            "Session recording finished"
        );

        let downstream_chunks = self.recorder.downstream_count();
        let downstream_bytes = self.recorder.downstream_bytes();
        let upstream_chunks = self.recorder.upstream_count();
        let malformed = self.recorder.malformed_count();
        let observations = self.recorder.into_log();

        let intervals = compute_intervals(&observations);
        let sizes = chunk_sizes(&observations);
        let interval_stats = analyze(&intervals);
        let size_stats = analyze(&sizes);
        let verdict = assess(&interval_stats, &size_stats, &self.config.thresholds);
        let pcm = reconstruct_pcm(&observations);

        let metadata = SessionMetadata {
            started_at: self.started_at,
            session_duration,
            downstream_chunks,
            downstream_bytes,
            upstream_chunks,
            audio_duration_secs: self.config.audio.duration_secs(pcm.len()),
            text_content: self.text,
            audio_file: None,
            aborted,
        };
        let report = JitterReport::build(&metadata, &interval_stats, &size_stats, &verdict)
            .with_samples(&intervals, &sizes);

        if malformed > 0 {
            tracing::warn!(malformed, "Session contained malformed chunks");
        }
        let tally = self.tally;
        tracing::info!(
            start = tally.start,
            upstream_audio = tally.upstream_audio,
            downstream_audio = tally.downstream_audio,
            text = tally.text,
            end = tally.end,
            ignored = tally.ignored,
            total = tally.total(),
            "Events seen"
        );
        tracing::info!(
            from = ?SessionState::Analyzing,
            to = ?SessionState::ReportReady,
            downstream_chunks,
            intervals = intervals.len(),
            insufficient_data = verdict.insufficient_data,
            "Session report ready"
        );

        SessionOutcome {
            report,
            pcm,
            observations,
            tally,
            state: SessionState::ReportReady,
        }
    }
}
