//! Jittertester Core - Chunk capture, jitter statistics, and reporting
//!
//! This library measures how regularly a remote real-time audio service
//! delivers its streamed response. Each received chunk is recorded with the
//! moment it arrived; when the session ends the inter-arrival gaps and chunk
//! sizes are summarized, a quality verdict is derived from fixed thresholds,
//! and everything is merged into a serializable [`JitterReport`].
//!
//! Network sessions, trigger payloads and file output are left to callers:
//! the core only consumes [`ChunkEvent`]s and hands back a [`SessionOutcome`].

pub mod capture;
pub mod config;
pub mod error;
pub mod report;
pub mod stats;

pub use capture::driver::{EventSender, SessionHandle};
pub use capture::observation::{ChunkEvent, Direction, Observation};
pub use capture::recorder::ChunkRecorder;
pub use capture::session::{EventTally, JitterSession, SessionOutcome, SessionState};
pub use config::{AudioFormat, JitterConfig, QualityThresholds};
pub use error::JitterError;
pub use report::builder::JitterReport;
pub use stats::quality::QualityVerdict;
pub use stats::summary::StatsBundle;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (YYYY-MM-DD) stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Sample rate of the service's PCM output (16kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Channel count of the service's PCM output
pub const DEFAULT_CHANNELS: u16 = 1;

/// Bit depth of the service's PCM output
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
