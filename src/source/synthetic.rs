//! Synthetic streaming service
//!
//! Plays both sides of a conversation with a real-time audio service without
//! touching the network. The trigger utterance is streamed upstream in
//! fixed-size chunks at a fixed cadence, then the "service" answers with a
//! tone split into downstream chunks whose spacing wanders around a nominal
//! interval. The wander comes from a glibc-style LCG, so a given seed always
//! produces the same schedule.

use super::{is_running, RunningFlag, SourceSummary};
use jittertester_core::report::wav::read_wav_pcm;
use jittertester_core::{AudioFormat, ChunkEvent, EventSender, JitterError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Default seed for the jitter generator
pub const DEFAULT_SEED: u32 = 0xDEADBEEF;

/// Upstream chunk size used when streaming the trigger (50ms at 16kHz 16-bit)
pub const TRIGGER_CHUNK_BYTES: usize = 1600;

/// Pause between upstream trigger chunks
pub const TRIGGER_INTERVAL_MS: u64 = 100;

/// Longest response chunk spacing the simulator accepts (one minute)
pub const MAX_GAP_MS: f64 = 60_000.0;

/// Longest generated silent trigger
pub const MAX_TRIGGER_SECS: f64 = 600.0;

fn default_response_chunks() -> usize {
    50
}
fn default_chunk_bytes() -> usize {
    3200
}
fn default_interval_ms() -> f64 {
    100.0
}
fn default_jitter_ms() -> f64 {
    15.0
}
fn default_response_delay_ms() -> u64 {
    300
}
fn default_trigger_chunk_bytes() -> usize {
    TRIGGER_CHUNK_BYTES
}
fn default_trigger_interval_ms() -> u64 {
    TRIGGER_INTERVAL_MS
}
fn default_tone_hz() -> f32 {
    440.0
}
fn default_seed() -> u32 {
    DEFAULT_SEED
}

/// Behaviour of the simulated service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Downstream chunks in the response
    #[serde(default = "default_response_chunks")]
    pub response_chunks: usize,
    /// Bytes per downstream chunk
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    /// Nominal spacing between downstream chunks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: f64,
    /// Maximum deviation from the nominal spacing, either way
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: f64,
    /// Silence between the end of the trigger and the first response chunk
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
    #[serde(default = "default_trigger_chunk_bytes")]
    pub trigger_chunk_bytes: usize,
    #[serde(default = "default_trigger_interval_ms")]
    pub trigger_interval_ms: u64,
    /// Transcript sent alongside the audio, one word per chunk
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f32,
    #[serde(default = "default_seed")]
    pub seed: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            response_chunks: default_response_chunks(),
            chunk_bytes: default_chunk_bytes(),
            interval_ms: default_interval_ms(),
            jitter_ms: default_jitter_ms(),
            response_delay_ms: default_response_delay_ms(),
            trigger_chunk_bytes: default_trigger_chunk_bytes(),
            trigger_interval_ms: default_trigger_interval_ms(),
            text: None,
            tone_hz: default_tone_hz(),
            seed: default_seed(),
        }
    }
}

impl SyntheticConfig {
    /// Reject timing values that cannot be turned into sleep durations
    pub fn validate(&self) -> Result<(), JitterError> {
        if !(0.0..=MAX_GAP_MS).contains(&self.interval_ms) {
            return Err(JitterError::Config(format!(
                "interval_ms must be within 0..={} ms, got {}",
                MAX_GAP_MS, self.interval_ms
            )));
        }
        if !(0.0..=MAX_GAP_MS).contains(&self.jitter_ms) {
            return Err(JitterError::Config(format!(
                "jitter_ms must be within 0..={} ms, got {}",
                MAX_GAP_MS, self.jitter_ms
            )));
        }
        if !self.tone_hz.is_finite() {
            return Err(JitterError::Config(format!(
                "tone_hz must be finite, got {}",
                self.tone_hz
            )));
        }
        Ok(())
    }
}

/// Simulated real-time audio service
pub struct SyntheticService {
    config: SyntheticConfig,
    format: AudioFormat,
    /// LCG state
    seed: u32,
    /// Tone phase in samples, carried across chunks
    sample_index: u64,
}

impl SyntheticService {
    pub fn new(config: SyntheticConfig, format: AudioFormat) -> Self {
        let seed = config.seed;
        Self {
            config,
            format,
            seed,
            sample_index: 0,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Next pseudo-random value in -1.0..1.0
    fn next_unit(&mut self) -> f64 {
        // LCG parameters (same as glibc)
        self.seed = self.seed.wrapping_mul(1103515245).wrapping_add(12345);
        let bits = (self.seed >> 16) & 0x7FFF;
        (bits as f64 / 16384.0) - 1.0
    }

    /// Spacing before the next downstream chunk, never negative
    pub fn next_gap(&mut self) -> Duration {
        let gap_ms = self.config.interval_ms + self.next_unit() * self.config.jitter_ms;
        // Unvalidated configs can carry non-finite spacing; treat it as no gap
        Duration::try_from_secs_f64(gap_ms.max(0.0) / 1000.0).unwrap_or_default()
    }

    /// Planned gaps for the whole response
    ///
    /// Consumes generator state; call on a fresh service to preview a run.
    pub fn schedule(&mut self) -> Vec<Duration> {
        (0..self.config.response_chunks)
            .map(|_| self.next_gap())
            .collect()
    }

    /// Next `chunk_bytes` of the response tone
    ///
    /// Tone samples are written as 16-bit little-endian; other sample widths
    /// get silence, which is enough for timing measurements.
    pub fn tone_chunk(&mut self) -> Vec<u8> {
        let bytes = self.config.chunk_bytes;
        if self.format.bits_per_sample != 16 {
            return vec![0; bytes];
        }

        let channels = self.format.channels.max(1) as usize;
        let rate = self.format.sample_rate.max(1) as f32;
        let mut chunk = Vec::with_capacity(bytes);
        while chunk.len() + 2 <= bytes {
            let t = self.sample_index as f32 / rate;
            let value = (2.0 * std::f32::consts::PI * self.config.tone_hz * t).sin() * 0.5;
            let sample = (value * i16::MAX as f32) as i16;
            for _ in 0..channels {
                if chunk.len() + 2 > bytes {
                    break;
                }
                chunk.extend_from_slice(&sample.to_le_bytes());
            }
            self.sample_index += 1;
        }
        chunk.resize(bytes, 0);
        chunk
    }

    /// Run one full exchange against a session
    ///
    /// Sends `Start`, streams `trigger` upstream, then emits the response and
    /// `End`. Stops early without `End` when `running` is cleared or the
    /// session stops accepting events.
    pub async fn run(
        &mut self,
        trigger: &[u8],
        sender: &EventSender,
        running: &RunningFlag,
    ) -> SourceSummary {
        let mut summary = SourceSummary::default();
        let words: Vec<String> = self
            .config
            .text
            .as_deref()
            .map(|t| t.split_whitespace().map(|w| format!("{} ", w)).collect())
            .unwrap_or_default();

        if self.deliver(sender, ChunkEvent::start(), &mut summary).await.is_err() {
            return summary;
        }

        let trigger_chunk = self.config.trigger_chunk_bytes.max(1);
        let trigger_pause = Duration::from_millis(self.config.trigger_interval_ms);
        for chunk in trigger.chunks(trigger_chunk) {
            if !is_running(running) {
                summary.interrupted = true;
                return summary;
            }
            if self
                .deliver(sender, ChunkEvent::upstream(chunk.to_vec()), &mut summary)
                .await
                .is_err()
            {
                return summary;
            }
            tokio::time::sleep(trigger_pause).await;
        }
        tracing::info!(
            bytes = trigger.len(),
            chunks = trigger.len().div_ceil(trigger_chunk),
            "Trigger sent"
        );

        tokio::time::sleep(Duration::from_millis(self.config.response_delay_ms)).await;

        let response_start = Instant::now();
        for index in 0..self.config.response_chunks {
            if index > 0 {
                let gap = self.next_gap();
                tokio::time::sleep(gap).await;
            }
            if !is_running(running) {
                tracing::warn!(sent = index, "Synthetic response interrupted");
                summary.interrupted = true;
                return summary;
            }
            let payload = self.tone_chunk();
            if self
                .deliver(sender, ChunkEvent::downstream(payload), &mut summary)
                .await
                .is_err()
            {
                return summary;
            }
            if let Some(word) = words.get(index) {
                if self
                    .deliver(sender, ChunkEvent::Text(word.clone()), &mut summary)
                    .await
                    .is_err()
                {
                    return summary;
                }
            }
        }

        if self.deliver(sender, ChunkEvent::end(), &mut summary).await.is_ok() {
            tracing::info!(
                chunks = self.config.response_chunks,
                elapsed_ms = response_start.elapsed().as_millis() as u64,
                "Synthetic response complete"
            );
        }
        summary
    }

    async fn deliver(
        &self,
        sender: &EventSender,
        event: ChunkEvent,
        summary: &mut SourceSummary,
    ) -> Result<(), JitterError> {
        match sender.send(event).await {
            Ok(()) => {
                summary.events_sent += 1;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session stopped accepting events");
                summary.interrupted = true;
                Err(e)
            }
        }
    }
}

/// Load a trigger utterance
///
/// `.wav` files must already be in `format`. Anything else is read as raw
/// little-endian PCM in `format`.
pub fn load_trigger(path: &Path, format: &AudioFormat) -> Result<Vec<u8>, JitterError> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    let pcm = if is_wav {
        read_wav_pcm(path, format)?
    } else {
        std::fs::read(path)?
    };
    tracing::info!(
        path = %path.display(),
        bytes = pcm.len(),
        duration_secs = %format!("{:.2}", format.duration_secs(pcm.len())),
        "Trigger loaded"
    );
    Ok(pcm)
}

/// Silent trigger of the given length
pub fn silent_trigger(duration: Duration, format: &AudioFormat) -> Vec<u8> {
    let frames = (duration.as_secs_f64() * format.sample_rate as f64) as usize;
    vec![0; frames * format.block_align()]
}

/// Silent trigger lasting `secs` seconds, as given on the command line
pub fn silent_trigger_secs(secs: f64, format: &AudioFormat) -> Result<Vec<u8>, JitterError> {
    if !(0.0..=MAX_TRIGGER_SECS).contains(&secs) {
        return Err(JitterError::Config(format!(
            "trigger length must be within 0..={} s, got {}",
            MAX_TRIGGER_SECS, secs
        )));
    }
    Ok(silent_trigger(Duration::from_secs_f64(secs), format))
}
