//! Tidal API response shapes.

use serde::Deserialize;

/// Response of `GET /track/?isrc=..&quality=..`
#[derive(Debug, Deserialize)]
pub struct TrackResponse {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub id: Option<u64>,
    pub url: Option<String>,
    #[serde(rename = "OriginalTrackUrl")]
    pub original_track_url: Option<String>,
}
