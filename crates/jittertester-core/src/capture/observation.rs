//! Chunk events and recorded observations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Which way a chunk travelled relative to the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent to the service (trigger or input audio)
    Upstream,
    /// Received from the service (response audio)
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
        }
    }
}

/// Event delivered by the streaming collaborator
///
/// `at` is captured by the collaborator at the moment the chunk is received,
/// before any queueing, so channel latency never skews the timing.
#[derive(Debug, Clone)]
pub enum ChunkEvent {
    /// The stream has started; opens the session
    Start { at: Instant },
    /// An audio chunk crossed the pipeline
    Audio {
        direction: Direction,
        payload: Vec<u8>,
        at: Instant,
    },
    /// A text fragment produced by the service
    Text(String),
    /// The stream has ended; closes the session
    End { at: Instant },
}

impl ChunkEvent {
    /// Stream start observed now
    pub fn start() -> Self {
        ChunkEvent::Start { at: Instant::now() }
    }

    /// Stream end observed now
    pub fn end() -> Self {
        ChunkEvent::End { at: Instant::now() }
    }

    /// Downstream audio chunk received now
    pub fn downstream(payload: Vec<u8>) -> Self {
        ChunkEvent::Audio {
            direction: Direction::Downstream,
            payload,
            at: Instant::now(),
        }
    }

    /// Upstream audio chunk sent now
    pub fn upstream(payload: Vec<u8>) -> Self {
        ChunkEvent::Audio {
            direction: Direction::Upstream,
            payload,
            at: Instant::now(),
        }
    }

    /// Short name used in logs and event tallies
    pub fn kind(&self) -> &'static str {
        match self {
            ChunkEvent::Start { .. } => "start",
            ChunkEvent::Audio {
                direction: Direction::Upstream,
                ..
            } => "audio_upstream",
            ChunkEvent::Audio {
                direction: Direction::Downstream,
                ..
            } => "audio_downstream",
            ChunkEvent::Text(_) => "text",
            ChunkEvent::End { .. } => "end",
        }
    }
}

/// A single recorded chunk
///
/// Created once by the recorder and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Observation {
    /// 0-based arrival order within the session
    pub sequence_index: u64,
    /// Arrival time relative to the session start
    pub timestamp: Duration,
    /// Raw chunk bytes
    pub payload: Vec<u8>,
    /// Chunk direction
    pub direction: Direction,
    /// Arrived with a timestamp earlier than the previous chunk in the same direction
    pub out_of_order: bool,
}

impl Observation {
    /// Arrival time in milliseconds since the session start
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp.as_secs_f64() * 1000.0
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True for zero-length payloads
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_downstream(&self) -> bool {
        self.direction == Direction::Downstream
    }
}
