//! Deezer: ISRC lookup on the public API, then a bulk decode mirror.
//!
//! The mirror names the file itself, so the result is whichever `.flac`
//! in the target folder was written last.

mod client;
pub mod dto;

pub use client::{DeezerClient, DeezerTrack, newest_flac};
