//! Amazon Music: catalog ID → Amazon URL via a link aggregator, then a
//! mirror that serves the (possibly encrypted) stream.
//!
//! Encrypted streams are decrypted through the [`MediaTool`](crate::media::MediaTool)
//! and keep whatever container the codec calls for (`.flac` or `.m4a`).

mod client;
pub mod dto;

pub use client::{AmazonClient, AmazonTrack};
