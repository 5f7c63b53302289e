//! Amazon Music HTTP client

use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use super::dto;
use crate::config::AmazonConfig;
use crate::media::MediaTool;
use crate::model::TrackDescriptor;
use crate::providers::{FetchRequest, ProviderError, http};

static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"B[0-9A-Z]{9}").expect("valid ASIN pattern"));

/// Stem of the working file before the orchestrator renames it.
const WORKING_STEM: &str = "temp_amazon";

/// A track resolved to an Amazon ASIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmazonTrack {
    pub asin: String,
    pub url: String,
}

/// Amazon client
pub struct AmazonClient {
    http_client: http::HttpClient,
    config: AmazonConfig,
    media: Arc<dyn MediaTool>,
}

impl AmazonClient {
    pub fn new(
        config: AmazonConfig,
        timeout: Duration,
        media: Arc<dyn MediaTool>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::client(timeout)?,
            config,
            media,
        })
    }

    /// Create a client for testing with both services on one base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>, media: Arc<dyn MediaTool>) -> Self {
        let base = base_url.into();
        Self {
            http_client: http::client(Duration::from_secs(5)).unwrap(),
            config: AmazonConfig {
                songlink_url: format!("{}/v1-alpha.1/links", base),
                mirror_url: base,
                ..Default::default()
            },
            media,
        }
    }

    /// Resolve the catalog track ID to an Amazon URL and ASIN.
    pub async fn locate(&self, track: &TrackDescriptor) -> Result<AmazonTrack, ProviderError> {
        let spotify_url = format!("https://open.spotify.com/track/{}", track.id);
        let url = format!(
            "{}?url={}",
            self.config.songlink_url,
            urlencoding::encode(&spotify_url)
        );

        let links: dto::LinksResponse = http::get_json(&self.http_client, &url).await?;
        let amazon_url = links
            .links_by_platform
            .get("amazonMusic")
            .map(|link| link.url.clone())
            .ok_or_else(|| ProviderError::NotFound("Amazon Music link not found".to_string()))?;

        let amazon_url = normalize_amazon_url(&amazon_url, &self.config.region);
        let asin = extract_asin(&amazon_url).ok_or_else(|| {
            ProviderError::NotFound(format!("Could not extract ASIN from {}", amazon_url))
        })?;

        tracing::debug!("Amazon ASIN {} for track {}", asin, track.id);
        Ok(AmazonTrack {
            asin,
            url: amazon_url,
        })
    }

    /// Download the stream, decrypting it when the mirror supplies a key.
    pub async fn fetch(
        &self,
        found: &AmazonTrack,
        request: &FetchRequest<'_>,
    ) -> Result<PathBuf, ProviderError> {
        let url = format!(
            "{}/api/track/{}",
            self.config.mirror_url.trim_end_matches('/'),
            found.asin
        );
        let info: dto::StreamInfo = http::get_json(&self.http_client, &url).await?;
        let stream_url = info
            .stream_url
            .filter(|u| !u.is_empty())
            .ok_or(ProviderError::MissingField("streamUrl"))?;

        let encrypted = request.dir.join(format!("{}.enc", found.asin));
        tracing::info!("Downloading from Amazon: {} ({})", found.asin, found.url);
        http::stream_to_file(&self.http_client, &stream_url, &encrypted, &request.progress)
            .await?;

        let output = match info.decryption_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                let codec = self.media.probe_codec(&encrypted).await?;
                let extension = if codec == "flac" { "flac" } else { "m4a" };
                let output = request.dir.join(format!("{}.{}", WORKING_STEM, extension));

                let result = self.media.decrypt(&encrypted, key.trim(), &output).await;
                let _ = tokio::fs::remove_file(&encrypted).await;
                result?;
                output
            }
            None => {
                let output = request.dir.join(format!("{}.m4a", WORKING_STEM));
                tokio::fs::rename(&encrypted, &output).await?;
                output
            }
        };

        let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(ProviderError::EmptyFile(output));
        }
        Ok(output)
    }
}

/// Rewrite `...?trackAsin=B0..` links into the canonical track URL.
pub fn normalize_amazon_url(url: &str, region: &str) -> String {
    let Some(start) = url.find("trackAsin=") else {
        return url.to_string();
    };
    let asin: String = url[start + "trackAsin=".len()..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    format!(
        "https://music.amazon.com/tracks/{}?musicTerritory={}",
        asin, region
    )
}

/// First ASIN-shaped token in a URL.
pub fn extract_asin(url: &str) -> Option<String> {
    ASIN_RE.find(url).map(|m| m.as_str().to_string())
}
