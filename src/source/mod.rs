//! Event sources that drive a jitter session
//!
//! A source owns the timing side of the pipeline: it stamps every chunk with
//! the moment it was received and forwards it through an [`EventSender`].
//! Sources poll a shared `running` flag (cleared by the Ctrl+C handler) and
//! stop early when it drops to false; the session is then finished as
//! aborted by dropping the sender.
//!
//! [`EventSender`]: jittertester_core::EventSender

pub mod synthetic;
pub mod trace;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use synthetic::{SyntheticConfig, SyntheticService};
pub use trace::{TraceError, TraceRecord};

/// Shared flag cleared when the user interrupts the run
pub type RunningFlag = Arc<AtomicBool>;

/// A flag that starts out running
pub fn running_flag() -> RunningFlag {
    Arc::new(AtomicBool::new(true))
}

/// True while no interrupt was requested
pub fn is_running(running: &RunningFlag) -> bool {
    running.load(Ordering::SeqCst)
}

/// Clear `running` on Ctrl+C
///
/// Returns false (after logging) when the handler cannot be installed, in
/// which case an interrupt kills the process without writing a report.
pub fn install_interrupt_handler(running: &RunningFlag) -> bool {
    let r = running.clone();
    match ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to install Ctrl+C handler, interrupting will not write a report"
            );
            false
        }
    }
}

/// What a source did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSummary {
    /// Events delivered to the session
    pub events_sent: u64,
    /// The source stopped before reaching its end of stream
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_flag_starts_running() {
        let running = running_flag();
        assert!(is_running(&running));
        running.store(false, Ordering::SeqCst);
        assert!(!is_running(&running));
    }

    #[test]
    fn test_second_interrupt_handler_is_reported() {
        let running = running_flag();
        // ctrlc allows one handler per process
        install_interrupt_handler(&running);
        assert!(!install_interrupt_handler(&running));
        assert!(is_running(&running));
    }
}
