//! Qobuz HTTP client
//!
//! Search: `{search_url}?query={isrc}&limit=1&app_id={app_id}`
//! Standard mirrors: `{mirror}{track_id}&quality={tier}`
//! Alternate mirror: `{jumo_url}?track_id=..&format_id=..&region=US`

use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::time::Duration;

use super::dto;
use super::ladder::{quality_ladder, resolve_with_fallback};
use super::obfuscation::decode_xor;
use crate::config::QobuzConfig;
use crate::model::TrackDescriptor;
use crate::organizer::format_filename;
use crate::providers::{FetchRequest, ProviderError, http};

/// A track found on Qobuz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QobuzTrack {
    pub id: u64,
    pub title: String,
}

/// One backend able to turn a track ID into a stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mirror {
    /// Plain JSON API; the track ID is appended to the base
    Standard(String),
    /// API that may answer with an obfuscated body
    Jumo(String),
}

impl std::fmt::Display for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard(base) => write!(f, "Standard({})", base),
            Self::Jumo(_) => write!(f, "Jumo-DL"),
        }
    }
}

/// Qobuz client
pub struct QobuzClient {
    http_client: http::HttpClient,
    config: QobuzConfig,
}

impl QobuzClient {
    pub fn new(config: QobuzConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::client(timeout)?,
            config,
        })
    }

    /// Create a client for testing with every endpoint on one base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            http_client: http::client(Duration::from_secs(5)).unwrap(),
            config: QobuzConfig {
                search_url: format!("{}/api.json/0.2/track/search", base),
                mirrors: vec![
                    format!("{}/a/stream?trackId=", base),
                    format!("{}/b/stream?trackId=", base),
                ],
                jumo_url: format!("{}/jumo/get", base),
                ..Default::default()
            },
        }
    }

    /// Search by ISRC and take the first hit.
    pub async fn locate(&self, track: &TrackDescriptor) -> Result<QobuzTrack, ProviderError> {
        if !track.has_isrc() {
            return Err(ProviderError::MissingIsrc("Qobuz"));
        }

        let isrc = track.isrc.trim();
        let url = format!(
            "{}?query={}&limit=1&app_id={}",
            self.config.search_url,
            urlencoding::encode(isrc),
            urlencoding::encode(&self.config.app_id)
        );
        let response: dto::SearchResponse = http::get_json(&self.http_client, &url).await?;

        let item = response
            .tracks
            .and_then(|page| page.items.into_iter().next())
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Qobuz: track not found for ISRC {}", isrc))
            })?;

        Ok(QobuzTrack {
            id: item.id,
            title: item.title.unwrap_or_else(|| track.title.clone()),
        })
    }

    /// Resolve a stream URL (walking the quality ladder) and download it
    /// under the Qobuz working name.
    pub async fn fetch(
        &self,
        found: &QobuzTrack,
        request: &FetchRequest<'_>,
    ) -> Result<PathBuf, ProviderError> {
        let tiers = quality_ladder(&self.config.quality, self.config.allow_fallback);
        tracing::info!(
            "Getting download URL for track ID: {} with requested quality: {}",
            found.id,
            tiers[0]
        );

        let (stream_url, _tier) =
            resolve_with_fallback(&tiers, |tier| self.resolve_url(found.id, tier)).await?;

        let name = working_name(request.filename_format, request.track, request.position);
        let destination = request.dir.join(name);
        http::stream_to_file(&self.http_client, &stream_url, &destination, &request.progress)
            .await?;
        Ok(destination)
    }

    /// Candidate mirrors in a fresh random order.
    pub fn shuffled_mirrors(&self) -> Vec<Mirror> {
        let mut mirrors: Vec<Mirror> = self
            .config
            .mirrors
            .iter()
            .cloned()
            .map(Mirror::Standard)
            .collect();
        if !self.config.jumo_url.is_empty() {
            mirrors.push(Mirror::Jumo(self.config.jumo_url.clone()));
        }

        let mut rng = rand::rng();
        mirrors.shuffle(&mut rng);
        mirrors
    }

    /// Try every mirror once at `quality`.
    async fn resolve_url(&self, track_id: u64, quality: String) -> Result<String, ProviderError> {
        let mut last_error = None;

        for mirror in self.shuffled_mirrors() {
            let result = match &mirror {
                Mirror::Standard(base) => self.from_standard(base, track_id, &quality).await,
                Mirror::Jumo(base) => self.from_jumo(base, track_id, &quality).await,
            };
            match result {
                Ok(url) => return Ok(url),
                Err(e) => {
                    tracing::debug!("{} failed at quality {}: {}", mirror, quality, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Exhausted("no mirrors configured".into())))
    }

    async fn from_standard(
        &self,
        base: &str,
        track_id: u64,
        quality: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}&quality={}", base, track_id, quality);
        let response: dto::StreamResponse = http::get_json(&self.http_client, &url).await?;
        response.into_url().ok_or_else(|| {
            ProviderError::Backend("Invalid standard API response structure".to_string())
        })
    }

    async fn from_jumo(
        &self,
        base: &str,
        track_id: u64,
        quality: &str,
    ) -> Result<String, ProviderError> {
        let format_id = match quality {
            "6" | "7" | "27" => quality,
            _ => "6",
        };
        let url = format!(
            "{}?track_id={}&format_id={}&region=US",
            base, track_id, format_id
        );

        let response = http::send(
            self.http_client
                .get(&url)
                .header("Referer", format!("{}/", origin(base))),
        )
        .await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        parse_jumo(&body)?
            .url
            .filter(|u| !u.is_empty())
            .ok_or(ProviderError::MissingField("URL"))
    }
}

/// Parse the alternate mirror body, de-obfuscating it when it is not JSON.
fn parse_jumo(body: &[u8]) -> Result<dto::JumoResponse, ProviderError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ProviderError::EmptyBody);
    }
    serde_json::from_slice(body)
        .or_else(|_| serde_json::from_str(&decode_xor(body)))
        .map_err(|_| ProviderError::InvalidJson("Failed to parse Jumo response".to_string()))
}

/// `scheme://host` part of a URL.
fn origin(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(slash) => &url[..after_scheme + slash],
        None => url,
    }
}

/// Temporary filename used before the orchestrator renames the result.
///
/// `{title}` and `{artist}` are swapped for fixed placeholders so the
/// working name never collides with a finished file.
pub fn working_name(filename_format: &str, track: &TrackDescriptor, position: usize) -> String {
    if filename_format.contains('{') {
        let template = filename_format
            .replace("{title}", "temp_qobuz")
            .replace("{artist}", "temp");
        format_filename(&template, track, position)
    } else {
        format_filename("temp_qobuz", track, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::no_progress;
    use crate::test_utils::{MockServer, Route, track};
    use tempfile::tempdir;

    fn obfuscate(text: &str) -> Vec<u8> {
        decode_xor(text.as_bytes()).into_bytes()
    }

    #[test]
    fn test_origin() {
        assert_eq!(origin("https://jumo-dl.pages.dev/get"), "https://jumo-dl.pages.dev");
        assert_eq!(origin("http://127.0.0.1:80"), "http://127.0.0.1:80");
    }

    #[test]
    fn test_parse_jumo_plain_and_obfuscated() {
        let plain = parse_jumo(br#"{"url": "https://a/b.flac"}"#).unwrap();
        assert_eq!(plain.url.as_deref(), Some("https://a/b.flac"));

        let hidden = parse_jumo(&obfuscate(r#"{"url":"https://c/d.flac"}"#)).unwrap();
        assert_eq!(hidden.url.as_deref(), Some("https://c/d.flac"));

        assert!(matches!(parse_jumo(b"   "), Err(ProviderError::EmptyBody)));
        assert!(parse_jumo(b"\x00\x01garbage").is_err());
    }

    #[test]
    fn test_stream_response_url_locations() {
        let top: dto::StreamResponse = serde_json::from_str(r#"{"url": "u1"}"#).unwrap();
        assert_eq!(top.into_url().as_deref(), Some("u1"));
        let nested: dto::StreamResponse =
            serde_json::from_str(r#"{"data": {"url": "u2"}}"#).unwrap();
        assert_eq!(nested.into_url().as_deref(), Some("u2"));
        let none: dto::StreamResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(none.into_url().is_none());
    }

    #[test]
    fn test_working_name() {
        let mut t = track("1", "Real Title");
        t.track_number = 4;
        assert_eq!(working_name("{title} - {artist}", &t, 1), "temp_qobuz - temp.flac");
        assert_eq!(working_name("{track} {title}", &t, 1), "04 temp_qobuz.flac");
        assert_eq!(working_name("title_only", &t, 1), "temp_qobuz.flac");
    }

    #[test]
    fn test_shuffled_mirrors_contains_every_candidate() {
        let client = QobuzClient::new(QobuzConfig::default(), Duration::from_secs(1)).unwrap();
        let mirrors = client.shuffled_mirrors();
        assert_eq!(mirrors.len(), 4);
        assert_eq!(mirrors.iter().filter(|m| matches!(m, Mirror::Jumo(_))).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_isrc_fails_fast() {
        let client = QobuzClient::with_base_url("http://127.0.0.1:9");
        let mut t = track("1", "Song");
        t.isrc.clear();
        assert_eq!(client.locate(&t).await.unwrap_err().to_string(), "No ISRC for Qobuz");
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let server = MockServer::start(vec![Route::json(
            "/api.json/0.2/track/search",
            200,
            r#"{"tracks": {"items": []}}"#,
        )])
        .await;
        let client = QobuzClient::with_base_url(server.url(""));

        let err = client.locate(&track("1", "Song")).await.unwrap_err();
        assert!(err.to_string().contains("track not found for ISRC"));
        assert!(server.requests()[0].contains("app_id=798273057"));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_obfuscated_mirror() {
        let server = MockServer::start(vec![
            Route::json("/api.json/0.2/track/search", 200, r#"{"tracks": {"items": [{"id": 77}]}}"#),
            Route::json("/a/stream", 500, ""),
            Route::json("/b/stream", 200, "   "),
            Route::bytes("/cdn/77.flac", 200, b"qobuz-flac".to_vec()),
        ])
        .await;
        let payload = format!(r#"{{"url":"{}"}}"#, server.url("/cdn/77.flac"));
        server.add(Route::bytes("/jumo/get", 200, obfuscate(&payload)));

        let client = QobuzClient::with_base_url(server.url(""));
        let t = track("1", "Song");
        let found = client.locate(&t).await.unwrap();
        assert_eq!(found.id, 77);

        let dir = tempdir().unwrap();
        let request = FetchRequest {
            track: &t,
            dir: dir.path(),
            canonical_name: "Song - Test Artist.flac",
            filename_format: "{title} - {artist}",
            position: 1,
            progress: no_progress(),
        };
        let path = client.fetch(&found, &request).await.unwrap();

        assert_eq!(path, dir.path().join("temp_qobuz - temp.flac"));
        assert_eq!(std::fs::read(&path).unwrap(), b"qobuz-flac");
        let jumo = server
            .requests()
            .into_iter()
            .find(|r| r.contains("/jumo/get"))
            .unwrap();
        assert!(jumo.contains("format_id=6"));
        assert!(jumo.to_lowercase().contains("referer:"));
    }
}
