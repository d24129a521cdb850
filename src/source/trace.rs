//! Trace file replay
//!
//! A trace is a JSON-lines capture of a streaming session, one event per
//! line. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"t_ms": 0, "kind": "start"}
//! {"t_ms": 120.5, "kind": "audio", "direction": "downstream", "len": 3200}
//! {"t_ms": 180, "kind": "audio", "direction": "downstream", "hex": "0100ff7f"}
//! {"t_ms": 900, "kind": "text", "text": "hello"}
//! {"t_ms": 5000, "kind": "end"}
//! ```
//!
//! Audio lines carry either real payload bytes (`hex`) or just a length, in
//! which case the payload is zero-filled. `t_ms` is the arrival offset from
//! the start of the capture and becomes `base + t_ms` on replay.

use super::{is_running, RunningFlag, SourceSummary};
use jittertester_core::{ChunkEvent, Direction, EventSender};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Latest accepted arrival offset (one week)
pub const MAX_OFFSET_MS: f64 = 7.0 * 24.0 * 3600.0 * 1000.0;

/// Errors reading a trace file
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid trace record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: invalid hex payload: {source}")]
    InvalidHex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error("line {line}: timestamp {t_ms} ms is outside 0..={max} ms", max = MAX_OFFSET_MS)]
    InvalidTime { line: usize, t_ms: f64 },
}

/// Kind-specific part of a trace line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceKind {
    Start,
    Audio {
        direction: Direction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        len: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hex: Option<String>,
    },
    Text {
        text: String,
    },
    End,
}

/// One line of a trace file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Arrival offset from the start of the capture
    pub t_ms: f64,
    #[serde(flatten)]
    pub kind: TraceKind,
}

impl TraceRecord {
    /// Audio record carrying only a payload length
    pub fn audio(t_ms: f64, direction: Direction, len: usize) -> Self {
        Self {
            t_ms,
            kind: TraceKind::Audio {
                direction,
                len: Some(len),
                hex: None,
            },
        }
    }

    /// Serialize as a single trace line
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decoded trace event, ready to replay
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Start,
    Audio {
        direction: Direction,
        payload: Vec<u8>,
    },
    Text(String),
    End,
}

/// A validated trace line
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// 1-based source line
    pub line: usize,
    /// Arrival offset from the start of the capture
    pub offset: Duration,
    pub event: TraceEvent,
}

impl TraceEntry {
    fn from_record(line: usize, record: TraceRecord) -> Result<Self, TraceError> {
        let invalid = || TraceError::InvalidTime {
            line,
            t_ms: record.t_ms,
        };
        if !(0.0..=MAX_OFFSET_MS).contains(&record.t_ms) {
            return Err(invalid());
        }
        let offset = Duration::try_from_secs_f64(record.t_ms / 1000.0).map_err(|_| invalid())?;

        let event = match record.kind {
            TraceKind::Start => TraceEvent::Start,
            TraceKind::End => TraceEvent::End,
            TraceKind::Text { text } => TraceEvent::Text(text),
            TraceKind::Audio {
                direction,
                len,
                hex: Some(encoded),
            } => {
                let payload = hex::decode(encoded.trim())
                    .map_err(|source| TraceError::InvalidHex { line, source })?;
                if let Some(len) = len.filter(|len| *len != payload.len()) {
                    tracing::warn!(
                        line,
                        declared = len,
                        actual = payload.len(),
                        "Trace length disagrees with hex payload, using payload"
                    );
                }
                TraceEvent::Audio { direction, payload }
            }
            TraceKind::Audio {
                direction,
                len,
                hex: None,
            } => TraceEvent::Audio {
                direction,
                payload: vec![0; len.unwrap_or(0)],
            },
        };

        Ok(Self {
            line,
            offset,
            event,
        })
    }

    /// Convert into a session event stamped relative to `base`
    pub fn to_chunk_event(&self, base: Instant) -> ChunkEvent {
        let at = base + self.offset;
        match &self.event {
            TraceEvent::Start => ChunkEvent::Start { at },
            TraceEvent::Audio { direction, payload } => ChunkEvent::Audio {
                direction: *direction,
                payload: payload.clone(),
                at,
            },
            TraceEvent::Text(text) => ChunkEvent::Text(text.clone()),
            TraceEvent::End => ChunkEvent::End { at },
        }
    }
}

/// Parse a trace from any buffered reader
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEntry>, TraceError> {
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: TraceRecord =
            serde_json::from_str(trimmed).map_err(|source| TraceError::Parse {
                line: line_no,
                source,
            })?;
        entries.push(TraceEntry::from_record(line_no, record)?);
    }
    Ok(entries)
}

/// Parse a trace file from disk
pub fn load_trace(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let file = std::fs::File::open(path)?;
    let entries = parse_trace(std::io::BufReader::new(file))?;
    tracing::info!(path = %path.display(), events = entries.len(), "Trace loaded");
    Ok(entries)
}

/// Deliver trace entries to a session in file order
///
/// Arrival stamps are `base + offset` regardless of pacing. With `realtime`
/// the replay also sleeps until each offset has elapsed, which keeps the
/// session's wall-clock duration faithful to the capture.
pub async fn replay(
    entries: &[TraceEntry],
    sender: &EventSender,
    realtime: bool,
    running: &RunningFlag,
) -> SourceSummary {
    let base = Instant::now();
    let mut summary = SourceSummary::default();

    for entry in entries {
        if !is_running(running) {
            tracing::warn!(line = entry.line, "Replay interrupted");
            summary.interrupted = true;
            break;
        }
        if realtime {
            tokio::time::sleep_until(tokio::time::Instant::from_std(base + entry.offset)).await;
        }
        if let Err(e) = sender.send(entry.to_chunk_event(base)).await {
            tracing::warn!(line = entry.line, error = %e, "Session stopped accepting events");
            summary.interrupted = true;
            break;
        }
        summary.events_sent += 1;
        tracing::debug!(line = entry.line, offset_ms = entry.offset.as_millis() as u64, "Replayed event");
    }

    tracing::info!(
        events = summary.events_sent,
        interrupted = summary.interrupted,
        "Replay finished"
    );
    summary
}
