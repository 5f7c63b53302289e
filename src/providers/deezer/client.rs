//! Deezer HTTP client

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::dto;
use crate::config::DeezerConfig;
use crate::model::TrackDescriptor;
use crate::organizer::{is_complete, sanitize_component, with_canonical_extension};
use crate::providers::{FetchRequest, ProviderError, http};

/// A track found on Deezer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeezerTrack {
    pub id: u64,
    pub title: String,
    pub artist: String,
}

/// Deezer client
pub struct DeezerClient {
    http_client: http::HttpClient,
    config: DeezerConfig,
}

impl DeezerClient {
    pub fn new(config: DeezerConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::client(timeout)?,
            config,
        })
    }

    /// Create a client for testing with custom base URLs
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http_client: http::client(Duration::from_secs(5)).unwrap(),
            config: DeezerConfig {
                api_url: base_url.clone(),
                mirror_url: base_url,
            },
        }
    }

    /// Resolve an ISRC to a Deezer track ID.
    pub async fn locate(&self, track: &TrackDescriptor) -> Result<DeezerTrack, ProviderError> {
        if !track.has_isrc() {
            return Err(ProviderError::MissingIsrc("Deezer"));
        }

        let url = format!(
            "{}/track/isrc:{}",
            self.config.api_url.trim_end_matches('/'),
            urlencoding::encode(track.isrc.trim())
        );
        let lookup: dto::TrackLookup = http::get_json(&self.http_client, &url).await?;
        parse_lookup(lookup, track)
    }

    /// Run the decode request and download the stream.
    ///
    /// Returns the file written under the backend-supplied name. The newest
    /// FLAC in the folder is only a fallback when that file is not there.
    pub async fn fetch(
        &self,
        found: &DeezerTrack,
        request: &FetchRequest<'_>,
    ) -> Result<PathBuf, ProviderError> {
        let url = format!(
            "{}/dl/{}?quality=flac",
            self.config.mirror_url.trim_end_matches('/'),
            found.id
        );
        let decoded: dto::DecodeResponse = http::get_json(&self.http_client, &url).await?;

        if let Some(error) = decoded.error.filter(|e| !e.is_empty()) {
            return Err(ProviderError::Backend(error));
        }
        let stream_url = decoded
            .url
            .filter(|u| !u.is_empty())
            .ok_or(ProviderError::MissingField("url"))?;

        let name = decoded
            .filename
            .map(|f| sanitize_component(&f))
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| sanitize_component(&format!("{} - {}", found.artist, found.title)));
        let destination = request.dir.join(with_canonical_extension(&name));

        tracing::info!("Downloading from Deezer: track {}", found.id);
        http::stream_to_file(&self.http_client, &stream_url, &destination, &request.progress)
            .await?;

        if is_complete(&destination) {
            return Ok(destination);
        }
        newest_flac(request.dir)
            .filter(|path| is_complete(path))
            .ok_or(ProviderError::EmptyFile(destination))
    }
}

fn parse_lookup(
    lookup: dto::TrackLookup,
    track: &TrackDescriptor,
) -> Result<DeezerTrack, ProviderError> {
    if let Some(error) = lookup.error {
        let message = error
            .message
            .or(error.kind)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ProviderError::NotFound(format!("Deezer: {}", message)));
    }

    let id = lookup.id.ok_or_else(|| {
        ProviderError::NotFound(format!("Deezer: track not found for ISRC {}", track.isrc))
    })?;

    Ok(DeezerTrack {
        id,
        title: lookup.title.unwrap_or_else(|| track.title.clone()),
        artist: lookup
            .artist
            .map(|a| a.name)
            .unwrap_or_else(|| track.artist_display()),
    })
}

/// Most recently modified `*.flac` directly inside `dir`.
pub fn newest_flac(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("flac"))
        })
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}
