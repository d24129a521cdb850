//! Jittertester - jitter measurement for real-time audio streaming services
//!
//! This library re-exports the analysis engine from `jittertester-core` and
//! adds the collaborators the command-line tool needs: event sources that
//! feed a session ([`source`]) and persistence of the session's artifacts
//! ([`output`]).

pub mod output;
pub mod source;

pub use jittertester_core::{capture, config, error, report, stats};

pub use jittertester_core::{
    AudioFormat, ChunkEvent, ChunkRecorder, Direction, EventSender, JitterConfig, JitterError,
    JitterReport, JitterSession, Observation, QualityThresholds, QualityVerdict, SessionHandle,
    SessionOutcome, SessionState, StatsBundle,
};
pub use jittertester_core::{BUILD_DATE, DEFAULT_SAMPLE_RATE, VERSION};
