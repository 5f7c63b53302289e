//! Deezer API response shapes.

use serde::Deserialize;

/// `GET /track/isrc:{isrc}` on the public API
#[derive(Debug, Deserialize)]
pub struct TrackLookup {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub artist: Option<Artist>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

/// Decode mirror answer
#[derive(Debug, Deserialize)]
pub struct DecodeResponse {
    #[serde(alias = "link")]
    pub url: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}
