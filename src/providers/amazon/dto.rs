//! Link aggregator and mirror response shapes.

use serde::Deserialize;
use std::collections::HashMap;

/// `GET /links?url=..` on the link aggregator
#[derive(Debug, Deserialize)]
pub struct LinksResponse {
    #[serde(rename = "linksByPlatform", default)]
    pub links_by_platform: HashMap<String, PlatformLink>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformLink {
    pub url: String,
}

/// `GET /api/track/{asin}` on the mirror
#[derive(Debug, Deserialize)]
pub struct StreamInfo {
    #[serde(rename = "streamUrl")]
    pub stream_url: Option<String>,
    #[serde(rename = "decryptionKey")]
    pub decryption_key: Option<String>,
}
