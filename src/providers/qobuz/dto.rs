//! Qobuz and mirror response shapes.

use serde::Deserialize;

/// `GET /track/search`
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
pub struct TrackItem {
    pub id: u64,
    pub title: Option<String>,
}

/// Standard mirror answer: `url` at the top level or under `data`
#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    pub url: Option<String>,
    pub data: Option<StreamData>,
}

#[derive(Debug, Deserialize)]
pub struct StreamData {
    pub url: Option<String>,
}

impl StreamResponse {
    pub fn into_url(self) -> Option<String> {
        self.url
            .filter(|u| !u.is_empty())
            .or_else(|| self.data.and_then(|d| d.url).filter(|u| !u.is_empty()))
    }
}

/// Alternate mirror answer (after de-obfuscation)
#[derive(Debug, Deserialize)]
pub struct JumoResponse {
    pub url: Option<String>,
}
