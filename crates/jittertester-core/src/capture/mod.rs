//! Chunk capture
//!
//! This module turns the event stream delivered by a collaborator into an
//! immutable session log:
//! - Tagged chunk events and recorded observations ([`observation`])
//! - Append-only session log ([`recorder`])
//! - Session lifecycle and end-of-session analysis ([`session`])
//! - Dedicated session thread fed through a channel ([`driver`])

pub mod driver;
pub mod observation;
pub mod recorder;
pub mod session;
