//! Tag and cover embedding for downloaded files.
//!
//! Uses the lofty crate for format-independent tag access. Existing tags
//! are cleared, then a fresh tag is written from the [`TrackDescriptor`].
//!
//! # Container conventions
//! - **FLAC** (Vorbis comments): full release date, `ORGANIZATION`, `URL`,
//!   and the generated-by string in `DESCRIPTION`
//! - **MP4/M4A** (atoms): year only in `©day`, generated-by string in `©cmt`
//!
//! Embedding is best effort: the caller logs failures and keeps the file.

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{FileType, TaggedFileExt};
use lofty::ogg::VorbisComments;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::TrackDescriptor;

/// Free-text marker written into every file.
pub const GENERATED_BY: &str = concat!("flacfetch ", env!("CARGO_PKG_VERSION"));

/// Embedding errors
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write tags to {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Tag task failed: {0}")]
    Task(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Write descriptive tags and cover art into an audio file.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, path: &Path, track: &TrackDescriptor) -> Result<(), EmbedError>;
}

/// Tag family a file is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Flac,
    Mp4,
    Other,
}

impl From<FileType> for Container {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Flac => Self::Flac,
            FileType::Mp4 => Self::Mp4,
            _ => Self::Other,
        }
    }
}

/// lofty-backed embedder that downloads cover art over HTTP.
pub struct TagWriter {
    http_client: reqwest::Client,
}

impl TagWriter {
    pub fn new(timeout: Duration) -> Result<Self, EmbedError> {
        let http_client = reqwest::Client::builder()
            .user_agent(crate::providers::http::USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Client(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// Download cover art; any failure yields `None`.
    async fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
        if url.is_empty() {
            return None;
        }

        let response = match self.http_client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!("Cover download returned HTTP {}", r.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("Cover download failed: {}", e);
                return None;
            }
        };

        response
            .bytes()
            .await
            .ok()
            .map(|b| b.to_vec())
            .filter(|b| !b.is_empty())
    }
}

#[async_trait]
impl Embedder for TagWriter {
    async fn embed(&self, path: &Path, track: &TrackDescriptor) -> Result<(), EmbedError> {
        let cover = self.fetch_cover(&track.cover_url).await;
        let path = path.to_path_buf();
        let track = track.clone();

        tokio::task::spawn_blocking(move || write_tags(&path, &track, cover))
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?
    }
}

/// Clear every tag on `path` and write a fresh one for `track`.
pub fn write_tags(
    path: &Path,
    track: &TrackDescriptor,
    cover: Option<Vec<u8>>,
) -> Result<(), EmbedError> {
    let read_err = |e: lofty::error::LoftyError| EmbedError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let write_err = |e: lofty::error::LoftyError| EmbedError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let tagged_file = Probe::open(path)
        .map_err(read_err)?
        .read()
        .map_err(read_err)?;

    let container = Container::from(tagged_file.file_type());
    let tag_type = tagged_file.primary_tag_type();

    for existing in tagged_file.tags() {
        existing.remove_from_path(path).map_err(write_err)?;
    }

    let tag = build_tag(tag_type, container, track, cover);
    match container {
        Container::Flac => flac_comments(tag, track).save_to_path(path, WriteOptions::default()),
        Container::Mp4 | Container::Other => tag.save_to_path(path, WriteOptions::default()),
    }
    .map_err(write_err)?;

    tracing::debug!("Embedded metadata into {:?}", path);
    Ok(())
}

/// Build the format-independent part of a track's tag.
///
/// Keys without a generic mapping (`ORGANIZATION`, `URL`, `DESCRIPTION`)
/// are added by [`flac_comments`].
pub fn build_tag(
    tag_type: TagType,
    container: Container,
    track: &TrackDescriptor,
    cover: Option<Vec<u8>>,
) -> Tag {
    let mut tag = Tag::new(tag_type);

    tag.set_title(track.title.clone());
    tag.set_artist(track.artist_display());
    tag.set_album(track.album.clone());
    tag.insert_text(ItemKey::AlbumArtist, track.album_artist.clone());

    match container {
        Container::Mp4 => {
            if let Ok(year) = track.year().parse::<u32>() {
                tag.set_year(year);
            }
        }
        Container::Flac | Container::Other => {
            if !track.release_date.is_empty() {
                tag.insert_text(ItemKey::RecordingDate, track.release_date.clone());
            }
        }
    }

    tag.set_track(track.track_number.max(1));
    if track.total_tracks > 0 {
        tag.set_track_total(track.total_tracks);
    }
    tag.set_disk(track.disc_number.max(1));
    if track.total_discs > 0 {
        tag.set_disk_total(track.total_discs);
    }

    if let Some(copyright) = track.copyright.as_ref().filter(|c| !c.is_empty()) {
        tag.insert_text(ItemKey::CopyrightMessage, copyright.clone());
    }
    if track.has_isrc() {
        tag.insert_text(ItemKey::Isrc, track.isrc.trim().to_string());
    }

    if container == Container::Mp4 {
        tag.insert_text(ItemKey::Comment, GENERATED_BY.to_string());
    }

    if let Some(data) = cover {
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Jpeg),
            None,
            data,
        ));
    }

    tag
}

/// Vorbis comments for a FLAC file: `tag` plus the FLAC-only fields.
pub fn flac_comments(tag: Tag, track: &TrackDescriptor) -> VorbisComments {
    let mut comments = VorbisComments::from(tag);

    if let Some(publisher) = track.publisher.as_ref().filter(|p| !p.is_empty()) {
        comments.insert("ORGANIZATION".to_string(), publisher.clone());
    }
    if !track.url.is_empty() {
        comments.insert("URL".to_string(), track.url.clone());
    }
    comments.insert("DESCRIPTION".to_string(), GENERATED_BY.to_string());
    comments
}

/// Mock embedder for testing.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records embed calls; optionally fails every one of them.
    #[derive(Default)]
    pub struct RecordingEmbedder {
        pub fail: bool,
        pub calls: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed(&self, path: &Path, track: &TrackDescriptor) -> Result<(), EmbedError> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_path_buf(), track.id.clone()));
            if self.fail {
                return Err(EmbedError::Write {
                    path: path.to_path_buf(),
                    message: "read-only file".to_string(),
                });
            }
            Ok(())
        }
    }
}
