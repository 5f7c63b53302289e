//! Qobuz: ISRC search, then a download URL from one of several mirrors.
//!
//! Mirrors are shuffled for every attempt. When every mirror fails at the
//! requested quality tier, the tier steps down (27 → 7 → 6).

mod client;
pub mod dto;
mod ladder;
mod obfuscation;

pub use client::{QobuzClient, QobuzTrack};
