//! Core data models for a download run.
//!
//! Defines the primary entities: [`TrackDescriptor`], [`BatchContext`], and
//! [`FailureRecord`]. Descriptors are produced by the catalog resolver and
//! consumed by the download orchestrator, which is the only code that
//! mutates them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Display string used when a track has no artist information.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Default title for tracks without one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Default album name for tracks without one.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// One song to acquire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Catalog ID (never empty for descriptors kept in a batch)
    pub id: String,
    /// Canonical catalog URL
    pub url: String,
    pub title: String,
    /// Artist names in catalog order
    pub artists: Vec<String>,
    pub album: String,
    pub album_artist: String,
    /// 1-based track number
    pub track_number: u32,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// ISRC, empty when unknown
    pub isrc: String,
    /// Release date as reported by the catalog (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub release_date: String,
    /// Cover image URL, empty when unknown
    pub cover_url: String,
    pub disc_number: u32,
    pub total_tracks: u32,
    pub total_discs: u32,
    pub copyright: Option<String>,
    pub publisher: Option<String>,
    /// Set once by the orchestrator after the file lands at its canonical path
    #[serde(default)]
    pub downloaded: bool,
}

impl TrackDescriptor {
    /// Artist names joined with `", "`, or [`UNKNOWN_ARTIST`] when empty.
    pub fn artist_display(&self) -> String {
        if self.artists.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            self.artists.join(", ")
        }
    }

    /// First artist, used for per-artist subfolders.
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ARTIST)
    }

    /// Leading `-` separated segment of the release date.
    pub fn year(&self) -> &str {
        self.release_date.split('-').next().unwrap_or("")
    }

    pub fn has_isrc(&self) -> bool {
        !self.isrc.trim().is_empty()
    }
}

impl Default for TrackDescriptor {
    fn default() -> Self {
        Self {
            id: String::new(),
            url: String::new(),
            title: UNKNOWN_TITLE.to_string(),
            artists: Vec::new(),
            album: UNKNOWN_ALBUM.to_string(),
            album_artist: String::new(),
            track_number: 1,
            duration_ms: 0,
            isrc: String::new(),
            release_date: String::new(),
            cover_url: String::new(),
            disc_number: 1,
            total_tracks: 0,
            total_discs: 0,
            copyright: None,
            publisher: None,
            downloaded: false,
        }
    }
}

/// How the tracks of a batch are grouped on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    Single,
    Album,
    Playlist,
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "track"),
            Self::Album => write!(f, "album"),
            Self::Playlist => write!(f, "playlist"),
        }
    }
}

/// Filename and folder layout options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Filename template (token or preset mode)
    pub filename_format: String,
    /// Prefix filenames with the track number
    pub numbered_filenames: bool,
    /// Playlist mode: one folder per primary artist
    pub artist_subfolders: bool,
    /// Playlist mode: one folder per album
    pub album_subfolders: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            filename_format: "{title} - {artist}".to_string(),
            numbered_filenames: false,
            artist_subfolders: false,
            album_subfolders: false,
        }
    }
}

/// A complete download run.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub tracks: Vec<TrackDescriptor>,
    pub output_dir: PathBuf,
    pub mode: GroupingMode,
    /// Album or playlist name; empty in single mode
    pub collection_name: String,
    pub layout: LayoutOptions,
}

impl BatchContext {
    /// Build a batch, enforcing that multi-track modes carry a collection name.
    pub fn new(
        tracks: Vec<TrackDescriptor>,
        output_dir: impl Into<PathBuf>,
        mode: GroupingMode,
        collection_name: impl Into<String>,
        layout: LayoutOptions,
    ) -> Result<Self> {
        let collection_name = collection_name.into();
        if mode != GroupingMode::Single && collection_name.trim().is_empty() {
            return Err(Error::config(format!(
                "{} batch requires a collection name",
                mode
            )));
        }

        Ok(Self {
            tracks,
            output_dir: output_dir.into(),
            mode,
            collection_name,
            layout,
        })
    }

    pub fn pending(&self) -> usize {
        self.tracks.iter().filter(|t| !t.downloaded).count()
    }
}

/// A track that every configured provider failed to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub title: String,
    pub artists: String,
    pub error: String,
}
