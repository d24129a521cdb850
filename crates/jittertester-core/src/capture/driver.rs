//! Session driver thread
//!
//! Runs one [`JitterSession`] on a dedicated thread that owns it outright.
//! Collaborators deliver [`ChunkEvent`]s through a channel; the thread is the
//! only writer to the session log, so recording needs no locks.
//!
//! The stream ends on [`ChunkEvent::End`] or when every sender is dropped
//! (abort). Both paths finish the session and produce a report, including
//! when the stream never started.

use super::observation::ChunkEvent;
use super::session::{Flow, JitterSession, SessionOutcome, SessionState};
use crate::config::JitterConfig;
use crate::error::JitterError;
use tokio::sync::{mpsc, oneshot, watch};

/// Events buffered between the collaborator and the session thread
const EVENT_QUEUE_DEPTH: usize = 1024;

/// Cloneable sending side handed to event sources
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ChunkEvent>,
}

impl EventSender {
    /// Deliver an event from async code
    pub async fn send(&self, event: ChunkEvent) -> Result<(), JitterError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| JitterError::SessionClosed)
    }

    /// Deliver an event from a plain thread
    pub fn blocking_send(&self, event: ChunkEvent) -> Result<(), JitterError> {
        self.tx
            .blocking_send(event)
            .map_err(|_| JitterError::SessionClosed)
    }

    /// True once the session thread has stopped accepting events
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to a running session thread
pub struct SessionHandle {
    sender: EventSender,
    state_rx: watch::Receiver<SessionState>,
    outcome_rx: oneshot::Receiver<Result<SessionOutcome, JitterError>>,
}

impl SessionHandle {
    /// Spawn the session thread and return a handle
    pub fn spawn(config: JitterConfig) -> Self {
        let (tx, rx) = mpsc::channel::<ChunkEvent>(EVENT_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("jitter-session".into())
            .spawn(move || {
                let outcome = run_session(config, rx, &state_tx);
                let _ = outcome_tx.send(outcome);
            })
            .map(|_| ())
            .unwrap_or_else(|e| {
                // outcome_tx is dropped with the closure; finish() reports SessionClosed
                tracing::error!(error = %e, "Failed to spawn session thread");
            });

        Self {
            sender: EventSender { tx },
            state_rx,
            outcome_rx,
        }
    }

    /// A sender for event sources
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Deliver an event from async code
    pub async fn send(&self, event: ChunkEvent) -> Result<(), JitterError> {
        self.sender.send(event).await
    }

    /// Latest lifecycle state published by the session thread
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to lifecycle state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Wait for the session to end and collect its outcome
    ///
    /// Drops this handle's sender first; if no other senders remain and no
    /// end event was sent, the session is finished as aborted.
    pub async fn finish(self) -> Result<SessionOutcome, JitterError> {
        let Self {
            sender, outcome_rx, ..
        } = self;
        drop(sender);
        outcome_rx.await.map_err(|_| JitterError::SessionClosed)?
    }

    /// Blocking variant of [`SessionHandle::finish`] for non-async callers
    pub fn finish_blocking(self) -> Result<SessionOutcome, JitterError> {
        let Self {
            sender, outcome_rx, ..
        } = self;
        drop(sender);
        outcome_rx
            .blocking_recv()
            .map_err(|_| JitterError::SessionClosed)?
    }
}

fn run_session(
    config: JitterConfig,
    mut rx: mpsc::Receiver<ChunkEvent>,
    state_tx: &watch::Sender<SessionState>,
) -> Result<SessionOutcome, JitterError> {
    let mut session: Option<JitterSession> = None;
    let mut ignored_before_start = 0u64;

    while let Some(event) = rx.blocking_recv() {
        match session.as_mut() {
            Some(active) => match active.handle(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::End) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Session aborted");
                    // Closing the receiver makes further sends fail fast
                    rx.close();
                    return Err(e);
                }
            },
            None => {
                if let ChunkEvent::Start { at } = event {
                    let mut started = JitterSession::start_at(config.clone(), at);
                    started.add_ignored(ignored_before_start);
                    state_tx.send_replace(SessionState::Recording);
                    session = Some(started);
                } else {
                    ignored_before_start += 1;
                    tracing::warn!(kind = event.kind(), "Event before stream start ignored");
                }
            }
        }
    }

    let session = session.unwrap_or_else(|| {
        tracing::warn!(
            ignored = ignored_before_start,
            "Stream closed before it started, reporting an empty session"
        );
        let mut empty = JitterSession::start(config);
        empty.add_ignored(ignored_before_start);
        empty
    });

    state_tx.send_replace(SessionState::Analyzing);
    let outcome = session.finish();
    state_tx.send_replace(SessionState::ReportReady);
    Ok(outcome)
}
