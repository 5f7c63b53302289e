//! Tidal-backed lossless API.
//!
//! ISRC-keyed, single backend. The backend answers either with a direct
//! file URL or with a `{success: false, error}` payload.

mod client;
pub mod dto;

pub use client::{TidalClient, TidalTrack};
