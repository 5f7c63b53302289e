//! Catalog access - turn a catalog URL into track descriptors.
//!
//! - [`parse_url`] identifies the entity a URL points at
//! - [`spotify::SpotifyClient`] fetches its raw JSON (behind [`CatalogApi`])
//! - [`resolver::resolve`] maps raw JSON onto [`TrackDescriptor`]s
//!
//! [`TrackDescriptor`]: crate::model::TrackDescriptor

pub mod resolver;
pub mod spotify;

use std::path::Path;
use std::str::FromStr;

pub use resolver::{Resolved, resolve};
pub use spotify::{CatalogApi, SpotifyClient};

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    #[error("Missing catalog credentials (set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET)")]
    MissingCredentials,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Invalid catalog response: {0}")]
    Parse(String),

    #[error("No tracks found in {0}")]
    Empty(String),

    #[error("Failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),
}

/// Entity kinds a catalog URL can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Track,
    Album,
    Playlist,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
        }
    }
}

impl FromStr for CatalogKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            other => Err(CatalogError::InvalidUrl(format!(
                "unsupported type '{}'",
                other
            ))),
        }
    }
}

/// A parsed catalog URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRef {
    pub kind: CatalogKind,
    pub id: String,
}

/// Parse `https://open.spotify.com/{type}/{id}` or `spotify:{type}:{id}`.
///
/// Query strings, fragments and locale segments (`/intl-de/`) are ignored.
pub fn parse_url(url: &str) -> Result<CatalogRef, CatalogError> {
    let url = url.trim();
    let invalid = || CatalogError::InvalidUrl(url.to_string());

    if let Some(rest) = url.strip_prefix("spotify:") {
        let mut parts = rest.split(':');
        let kind = parts.next().ok_or_else(invalid)?.parse()?;
        let id = parts.next().filter(|id| is_valid_id(id)).ok_or_else(invalid)?;
        return Ok(CatalogRef {
            kind,
            id: id.to_string(),
        });
    }

    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let path = without_scheme
        .strip_prefix("open.spotify.com/")
        .ok_or_else(invalid)?;
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with("intl-"))
        .collect();

    match segments.as_slice() {
        [kind, id, ..] if is_valid_id(id) => Ok(CatalogRef {
            kind: kind.parse()?,
            id: id.to_string(),
        }),
        _ => Err(invalid()),
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Load raw catalog JSON saved to disk.
pub fn load_metadata_file(path: &Path) -> Result<serde_json::Value, CatalogError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CatalogError::Parse(e.to_string()))
}
