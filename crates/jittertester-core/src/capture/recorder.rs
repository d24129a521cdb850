//! Append-only chunk recorder
//!
//! Keeps every observation of one session in arrival order. There is exactly
//! one writer (the session's event loop), so appends need no locking.
//!
//! Malformed chunks are recorded anyway, to keep the log faithful to what
//! actually arrived:
//! - zero-length payloads are kept but never counted as chunk sizes
//! - chunks timestamped before their predecessor (same direction) are
//!   flagged `out_of_order` and skipped by the interval computer

use super::observation::{Direction, Observation};
use crate::error::JitterError;
use std::time::Duration;

/// Session log writer
#[derive(Debug)]
pub struct ChunkRecorder {
    /// Observations in arrival order
    log: Vec<Observation>,
    /// Maximum observations before the session is aborted
    limit: usize,
    /// Latest accepted timestamp per direction (upstream, downstream)
    last_timestamp: [Option<Duration>; 2],
    /// Bytes received downstream
    downstream_bytes: u64,
    /// Downstream observation count
    downstream_count: u64,
    /// Observations flagged as malformed (empty or out of order)
    malformed_count: u64,
}

impl ChunkRecorder {
    /// Create a recorder that refuses to grow beyond `limit` observations
    pub fn new(limit: usize) -> Self {
        Self {
            log: Vec::new(),
            limit,
            last_timestamp: [None, None],
            downstream_bytes: 0,
            downstream_count: 0,
            malformed_count: 0,
        }
    }

    /// Append an observation
    ///
    /// # Arguments
    /// * `payload` - Chunk bytes
    /// * `direction` - Chunk direction
    /// * `at` - Arrival time relative to the session start, captured by the caller
    ///
    /// # Errors
    /// [`JitterError::ResourceExhausted`] once the log holds `limit` observations.
    /// The log is left untouched in that case.
    pub fn record(
        &mut self,
        payload: Vec<u8>,
        direction: Direction,
        at: Duration,
    ) -> Result<(), JitterError> {
        if self.log.len() >= self.limit {
            tracing::error!(
                limit = self.limit,
                "Session log full, refusing to truncate"
            );
            return Err(JitterError::ResourceExhausted { limit: self.limit });
        }

        let sequence_index = self.log.len() as u64;
        let slot = &mut self.last_timestamp[direction_slot(direction)];
        let out_of_order = matches!(*slot, Some(prev) if at < prev);
        if out_of_order {
            tracing::warn!(
                sequence_index,
                %direction,
                at_ms = at.as_secs_f64() * 1000.0,
                "Chunk arrived with a non-monotonic timestamp"
            );
        } else {
            *slot = Some(at);
        }

        if payload.is_empty() {
            tracing::warn!(sequence_index, %direction, "Zero-length chunk recorded");
        }
        if out_of_order || payload.is_empty() {
            self.malformed_count += 1;
        }

        if direction == Direction::Downstream {
            self.downstream_count += 1;
            self.downstream_bytes += payload.len() as u64;
        }

        tracing::debug!(
            sequence_index,
            %direction,
            bytes = payload.len(),
            at_ms = %format!("{:.3}", at.as_secs_f64() * 1000.0),
            "chunk_recorded"
        );

        self.log.push(Observation {
            sequence_index,
            timestamp: at,
            payload,
            direction,
            out_of_order,
        });
        Ok(())
    }

    /// Recorded observations in arrival order
    pub fn observations(&self) -> &[Observation] {
        &self.log
    }

    /// Total observations recorded
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Number of downstream observations
    pub fn downstream_count(&self) -> u64 {
        self.downstream_count
    }

    /// Total downstream payload bytes
    pub fn downstream_bytes(&self) -> u64 {
        self.downstream_bytes
    }

    /// Number of upstream observations
    pub fn upstream_count(&self) -> u64 {
        self.log.len() as u64 - self.downstream_count
    }

    /// Observations flagged as empty or out of order
    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    /// Configured observation limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Consume the recorder, yielding the finished log
    pub fn into_log(self) -> Vec<Observation> {
        self.log
    }
}

fn direction_slot(direction: Direction) -> usize {
    match direction {
        Direction::Upstream => 0,
        Direction::Downstream => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_recorder_creation() {
        let recorder = ChunkRecorder::new(16);
        assert!(recorder.is_empty());
        assert_eq!(recorder.downstream_count(), 0);
        assert_eq!(recorder.limit(), 16);
    }

    #[test]
    fn test_sequence_indices_follow_arrival_order() {
        let mut recorder = ChunkRecorder::new(16);
        recorder.record(vec![0; 10], Direction::Upstream, ms(0)).unwrap();
        recorder.record(vec![0; 20], Direction::Downstream, ms(5)).unwrap();
        recorder.record(vec![0; 30], Direction::Downstream, ms(9)).unwrap();

        let indices: Vec<u64> = recorder
            .observations()
            .iter()
            .map(|o| o.sequence_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(recorder.downstream_count(), 2);
        assert_eq!(recorder.downstream_bytes(), 50);
        assert_eq!(recorder.upstream_count(), 1);
    }

    #[test]
    fn test_limit_is_enforced_without_truncation() {
        let mut recorder = ChunkRecorder::new(2);
        recorder.record(vec![1], Direction::Downstream, ms(0)).unwrap();
        recorder.record(vec![2], Direction::Downstream, ms(1)).unwrap();

        let result = recorder.record(vec![3], Direction::Downstream, ms(2));
        assert!(matches!(
            result,
            Err(JitterError::ResourceExhausted { limit: 2 })
        ));
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.observations()[1].payload, vec![2]);
    }

    #[test]
    fn test_out_of_order_is_flagged_and_kept() {
        let mut recorder = ChunkRecorder::new(16);
        recorder.record(vec![0; 4], Direction::Downstream, ms(100)).unwrap();
        recorder.record(vec![0; 4], Direction::Downstream, ms(50)).unwrap();
        recorder.record(vec![0; 4], Direction::Downstream, ms(120)).unwrap();

        let flags: Vec<bool> = recorder
            .observations()
            .iter()
            .map(|o| o.out_of_order)
            .collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(recorder.malformed_count(), 1);
    }

    #[test]
    fn test_directions_are_ordered_independently() {
        let mut recorder = ChunkRecorder::new(16);
        recorder.record(vec![0; 4], Direction::Upstream, ms(200)).unwrap();
        recorder.record(vec![0; 4], Direction::Downstream, ms(150)).unwrap();
        assert!(!recorder.observations()[1].out_of_order);
    }

    #[test]
    fn test_empty_payload_is_recorded() {
        let mut recorder = ChunkRecorder::new(16);
        recorder.record(Vec::new(), Direction::Downstream, ms(0)).unwrap();
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.downstream_count(), 1);
        assert_eq!(recorder.downstream_bytes(), 0);
        assert_eq!(recorder.malformed_count(), 1);
    }

    #[test]
    fn test_equal_timestamps_are_not_out_of_order() {
        let mut recorder = ChunkRecorder::new(16);
        recorder.record(vec![0; 4], Direction::Downstream, ms(10)).unwrap();
        recorder.record(vec![0; 4], Direction::Downstream, ms(10)).unwrap();
        assert_eq!(recorder.malformed_count(), 0);
    }
}
