//! Download providers - locate a track on a streaming backend and pull the
//! audio to disk.
//!
//! # Architecture
//!
//! Each provider lives in its own module with the same layout:
//! - **DTOs** (`dto.rs`) - Exact API response shapes
//! - **Client** (`client.rs`) - `locate` a track, then `fetch` it to disk
//!
//! The four clients are wrapped in the closed [`Provider`] enum, which
//! implements the single [`TrackSource`] capability the orchestrator talks
//! to. Adding a provider means adding a variant, and the compiler points at
//! every match that needs it.
//!
//! Every attempt is either a finished file on disk or a [`ProviderError`].
//! Partial downloads live in `*.part` files and never reach the final path.

pub mod amazon;
pub mod deezer;
pub mod http;
pub mod qobuz;
pub mod tidal;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::media::MediaTool;
use crate::model::TrackDescriptor;

pub use amazon::AmazonClient;
pub use deezer::DeezerClient;
pub use qobuz::QobuzClient;
pub use tidal::TidalClient;

/// Progress callback: `(bytes_done, bytes_total)`; a total of 0 means unknown.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Progress callback that discards updates.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_, _| {})
}

/// Supported download backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Tidal,
    Deezer,
    Qobuz,
    Amazon,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [Self::Tidal, Self::Deezer, Self::Qobuz, Self::Amazon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tidal => "tidal",
            Self::Deezer => "deezer",
            Self::Qobuz => "qobuz",
            Self::Amazon => "amazon",
        }
    }

    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Tidal => "Tidal",
            Self::Deezer => "Deezer",
            Self::Qobuz => "Qobuz",
            Self::Amazon => "Amazon",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tidal" => Ok(Self::Tidal),
            "deezer" => Ok(Self::Deezer),
            "qobuz" => Ok(Self::Qobuz),
            "amazon" => Ok(Self::Amazon),
            other => Err(format!(
                "unknown service '{}' (expected tidal, deezer, qobuz or amazon)",
                other
            )),
        }
    }
}

/// A single failed provider attempt.
///
/// Always recovered by the caller: a mirror failure moves to the next
/// mirror, a provider failure moves to the next provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("No ISRC for {0}")]
    MissingIsrc(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Empty response body")]
    EmptyBody,

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("{0} not found in response")]
    MissingField(&'static str),

    #[error("{0}")]
    NotFound(String),

    /// Structured failure payload returned by a backend
    #[error("{0}")]
    Backend(String),

    #[error("Downloaded file is empty or missing: {0}")]
    EmptyFile(PathBuf),

    #[error("File error: {0}")]
    Io(String),

    #[error("Media tool error: {0}")]
    Media(String),

    #[error("{0}")]
    Exhausted(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<crate::media::MediaError> for ProviderError {
    fn from(e: crate::media::MediaError) -> Self {
        Self::Media(e.to_string())
    }
}

/// Everything a provider needs to materialize one track.
#[derive(Clone)]
pub struct FetchRequest<'a> {
    pub track: &'a TrackDescriptor,
    /// Folder the track ends up in
    pub dir: &'a Path,
    /// Canonical filename (with `.flac`)
    pub canonical_name: &'a str,
    /// Batch filename template, used to derive working names
    pub filename_format: &'a str,
    /// 1-based position in the batch
    pub position: usize,
    pub progress: ProgressFn,
}

/// Capability the orchestrator drives: turn a track into a file on disk.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Service name for logs and events.
    fn name(&self) -> &str;

    /// Locate the track and fetch it, including any decode step.
    async fn acquire(&self, request: &FetchRequest<'_>) -> Result<PathBuf, ProviderError>;
}

/// The closed set of download backends.
pub enum Provider {
    Tidal(TidalClient),
    Deezer(DeezerClient),
    Qobuz(QobuzClient),
    Amazon(AmazonClient),
}

impl Provider {
    /// Build the client for `kind` from configuration.
    pub fn from_config(
        kind: ProviderKind,
        config: &Config,
        media: Arc<dyn MediaTool>,
    ) -> Result<Self, ProviderError> {
        let timeout = config.download.timeout();
        Ok(match kind {
            ProviderKind::Tidal => Self::Tidal(TidalClient::new(config.tidal.clone(), timeout)?),
            ProviderKind::Deezer => Self::Deezer(DeezerClient::new(config.deezer.clone(), timeout)?),
            ProviderKind::Qobuz => Self::Qobuz(QobuzClient::new(config.qobuz.clone(), timeout)?),
            ProviderKind::Amazon => {
                Self::Amazon(AmazonClient::new(config.amazon.clone(), timeout, media)?)
            }
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Tidal(_) => ProviderKind::Tidal,
            Self::Deezer(_) => ProviderKind::Deezer,
            Self::Qobuz(_) => ProviderKind::Qobuz,
            Self::Amazon(_) => ProviderKind::Amazon,
        }
    }
}

#[async_trait]
impl TrackSource for Provider {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    async fn acquire(&self, request: &FetchRequest<'_>) -> Result<PathBuf, ProviderError> {
        match self {
            Self::Tidal(client) => {
                let found = client.locate(request.track).await?;
                client.fetch(&found, request).await
            }
            Self::Deezer(client) => {
                let found = client.locate(request.track).await?;
                client.fetch(&found, request).await
            }
            Self::Qobuz(client) => {
                let found = client.locate(request.track).await?;
                client.fetch(&found, request).await
            }
            Self::Amazon(client) => {
                let found = client.locate(request.track).await?;
                client.fetch(&found, request).await
            }
        }
    }
}
