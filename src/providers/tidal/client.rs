//! Tidal HTTP client

use std::path::PathBuf;
use std::time::Duration;

use super::dto;
use crate::config::TidalConfig;
use crate::model::TrackDescriptor;
use crate::providers::{FetchRequest, ProviderError, http};

/// A located Tidal track with its file URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidalTrack {
    pub id: Option<u64>,
    pub url: String,
}

/// Tidal client
pub struct TidalClient {
    http_client: http::HttpClient,
    config: TidalConfig,
}

impl TidalClient {
    pub fn new(config: TidalConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::client(timeout)?,
            config,
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: http::client(Duration::from_secs(5)).unwrap(),
            config: TidalConfig {
                api_url: base_url.into(),
                ..Default::default()
            },
        }
    }

    /// Look up the track by ISRC and get its file URL.
    pub async fn locate(&self, track: &TrackDescriptor) -> Result<TidalTrack, ProviderError> {
        if !track.has_isrc() {
            return Err(ProviderError::MissingIsrc("Tidal"));
        }

        let url = format!(
            "{}/track/?isrc={}&quality={}",
            self.config.api_url.trim_end_matches('/'),
            urlencoding::encode(track.isrc.trim()),
            urlencoding::encode(&self.config.quality)
        );

        let response: dto::TrackResponse = http::get_json(&self.http_client, &url).await?;
        parse_track(response)
    }

    /// Stream the file to its canonical name.
    pub async fn fetch(
        &self,
        found: &TidalTrack,
        request: &FetchRequest<'_>,
    ) -> Result<PathBuf, ProviderError> {
        let destination = request.dir.join(request.canonical_name);
        tracing::info!("Downloading from Tidal: {}", request.canonical_name);
        http::stream_to_file(&self.http_client, &found.url, &destination, &request.progress).await?;
        Ok(destination)
    }
}

fn parse_track(response: dto::TrackResponse) -> Result<TidalTrack, ProviderError> {
    if response.success == Some(false) {
        return Err(ProviderError::Backend(
            response
                .error
                .unwrap_or_else(|| "Tidal download failed".to_string()),
        ));
    }

    let url = response
        .url
        .or(response.original_track_url)
        .filter(|u| !u.is_empty())
        .ok_or(ProviderError::MissingField("url"))?;

    Ok(TidalTrack {
        id: response.id,
        url,
    })
}
