//! Spotify Web API client.
//!
//! Authenticates with the client-credentials flow and returns raw JSON
//! for tracks, albums and playlists, with paginated track lists merged
//! into a single document.
//! See: https://developer.spotify.com/documentation/web-api
//!
//! Album track listings omit `external_ids`, so album tracks are looked
//! up again through `/tracks?ids=` to recover their ISRCs.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{CatalogError, CatalogKind, CatalogRef};
use crate::config::Credentials;

const API_URL: &str = "https://api.spotify.com/v1";
const AUTH_URL: &str = "https://accounts.spotify.com";

/// Maximum ids per `/tracks` lookup.
const TRACK_BATCH: usize = 50;

/// Source of raw catalog JSON.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch(&self, target: &CatalogRef) -> Result<Value, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

struct Token {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    http_client: reqwest::Client,
    api_url: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<Token>>,
}

impl SpotifyClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, CatalogError> {
        let (Some(id), Some(secret)) = (
            credentials.client_id.as_deref().filter(|s| !s.is_empty()),
            credentials.client_secret.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(CatalogError::MissingCredentials);
        };
        Self::build(API_URL, AUTH_URL, id, secret, timeout)
    }

    /// Create a client for testing with custom base URLs
    #[cfg(test)]
    pub fn with_base_url(base_url: &str) -> Self {
        Self::build(
            &format!("{}/v1", base_url),
            base_url,
            "id",
            "secret",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn build(
        api_url: &str,
        auth_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let builder = reqwest::Client::builder().timeout(timeout);
        #[cfg(test)]
        let builder = builder.no_proxy();
        let http_client = builder
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, refreshed a minute before expiry.
    async fn token(&self) -> Result<String, CatalogError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http_client
            .post(format!("{}/api/token", self.auth_url))
            .header("Authorization", format!("Basic {}", basic))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Auth(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Auth(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *guard = Some(Token {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!("Obtained catalog token valid for {:?}", lifetime);
        Ok(token.access_token)
    }

    async fn get(&self, url: &str) -> Result<Value, CatalogError> {
        let token = self.token().await?;
        tracing::debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Follow `tracks.next` and append every page's items to `tracks.items`.
    async fn collect_pages(&self, document: &mut Value) -> Result<(), CatalogError> {
        let mut next = next_url(document.get("tracks"));

        while let Some(url) = next {
            let page = self.get(&url).await?;
            let items = page
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if let Some(list) = document
                .pointer_mut("/tracks/items")
                .and_then(Value::as_array_mut)
            {
                list.extend(items);
            }
            next = next_url(Some(&page));
        }
        Ok(())
    }

    /// Fill `external_ids` on album tracks from the full track objects.
    async fn backfill_isrcs(&self, album: &mut Value) -> Result<(), CatalogError> {
        let Some(items) = album
            .pointer_mut("/tracks/items")
            .and_then(Value::as_array_mut)
        else {
            return Ok(());
        };

        let ids: Vec<String> = items
            .iter()
            .filter(|item| item.pointer("/external_ids/isrc").is_none())
            .filter_map(|item| item.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for chunk in ids.chunks(TRACK_BATCH) {
            let url = format!("{}/tracks?ids={}", self.api_url, chunk.join(","));
            let full = self.get(&url).await?;
            let Some(tracks) = full.get("tracks").and_then(Value::as_array) else {
                continue;
            };

            for track in tracks {
                let (Some(id), Some(external)) = (
                    track.get("id").and_then(Value::as_str),
                    track.get("external_ids"),
                ) else {
                    continue;
                };
                if let Some(item) = items
                    .iter_mut()
                    .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
                    && let Some(obj) = item.as_object_mut()
                {
                    obj.insert("external_ids".to_string(), external.clone());
                }
            }
        }
        Ok(())
    }
}

fn next_url(page: Option<&Value>) -> Option<String> {
    page?
        .get("next")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn fetch(&self, target: &CatalogRef) -> Result<Value, CatalogError> {
        match target.kind {
            CatalogKind::Track => {
                self.get(&format!("{}/tracks/{}", self.api_url, target.id))
                    .await
            }
            CatalogKind::Album => {
                let mut album = self
                    .get(&format!("{}/albums/{}", self.api_url, target.id))
                    .await?;
                self.collect_pages(&mut album).await?;
                self.backfill_isrcs(&mut album).await?;
                Ok(album)
            }
            CatalogKind::Playlist => {
                let mut playlist = self
                    .get(&format!("{}/playlists/{}", self.api_url, target.id))
                    .await?;
                self.collect_pages(&mut playlist).await?;
                Ok(playlist)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockServer, Route};

    const TOKEN: &str = r#"{"access_token": "tok", "token_type": "Bearer", "expires_in": 3600}"#;

    #[test]
    fn test_new_requires_credentials() {
        let empty = Credentials::default();
        assert!(matches!(
            SpotifyClient::new(&empty, Duration::from_secs(1)),
            Err(CatalogError::MissingCredentials)
        ));

        let creds = Credentials {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
        };
        let client = SpotifyClient::new(&creds, Duration::from_secs(1)).unwrap();
        assert_eq!(client.api_url, API_URL);
    }

    #[tokio::test]
    async fn test_fetch_track_sends_basic_then_bearer() {
        let server = MockServer::start(vec![
            Route::json("/api/token", 200, TOKEN),
            Route::json("/v1/tracks/abc", 200, r#"{"id": "abc", "name": "Song"}"#),
        ])
        .await;
        let client = SpotifyClient::with_base_url(&server.url(""));
        let target = CatalogRef {
            kind: CatalogKind::Track,
            id: "abc".into(),
        };

        let value = client.fetch(&target).await.unwrap();
        client.fetch(&target).await.unwrap();

        assert_eq!(value["name"], "Song");
        let requests = server.requests();
        let token_calls = requests.iter().filter(|r| r.contains("/api/token")).count();
        assert_eq!(token_calls, 1);
        // "id:secret"
        assert!(requests[0].contains("Basic aWQ6c2VjcmV0"));
        assert!(requests[1].to_lowercase().contains("bearer tok"));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start(vec![Route::json("/api/token", 400, "{}")]).await;
        let client = SpotifyClient::with_base_url(&server.url(""));
        let target = CatalogRef {
            kind: CatalogKind::Track,
            id: "abc".into(),
        };

        let err = client.fetch(&target).await.unwrap_err();
        assert!(matches!(err, CatalogError::Auth(_)));
    }

    #[tokio::test]
    async fn test_album_pages_and_isrc_backfill() {
        let server = MockServer::start(vec![Route::json("/api/token", 200, TOKEN)]).await;
        let page_two = server.url("/v1/albums/al/tracks?offset=1");
        server.add(Route::json(
            "/v1/albums/al/tracks",
            200,
            r#"{"items": [{"id": "t2", "name": "Two"}], "next": null}"#,
        ));
        server.add(Route::json(
            "/v1/albums/al",
            200,
            &format!(
                r#"{{"name": "Album", "tracks": {{"items": [{{"id": "t1", "name": "One"}}], "next": "{}"}}}}"#,
                page_two
            ),
        ));
        server.add(Route::json(
            "/v1/tracks?ids=t1,t2",
            200,
            r#"{"tracks": [
                {"id": "t1", "external_ids": {"isrc": "ISRC1"}},
                {"id": "t2", "external_ids": {"isrc": "ISRC2"}}
            ]}"#,
        ));

        let client = SpotifyClient::with_base_url(&server.url(""));
        let album = client
            .fetch(&CatalogRef {
                kind: CatalogKind::Album,
                id: "al".into(),
            })
            .await
            .unwrap();

        let items = album["tracks"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["external_ids"]["isrc"], "ISRC1");
        assert_eq!(items[1]["external_ids"]["isrc"], "ISRC2");
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start(vec![Route::json("/api/token", 200, TOKEN)]).await;
        let client = SpotifyClient::with_base_url(&server.url(""));

        let err = client
            .fetch(&CatalogRef {
                kind: CatalogKind::Playlist,
                id: "missing".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }
}
