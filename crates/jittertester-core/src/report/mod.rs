//! Session output
//!
//! - Structured jitter report and its JSON form ([`builder`])
//! - Reconstructed audio artifact ([`wav`])

pub mod builder;
pub mod wav;
