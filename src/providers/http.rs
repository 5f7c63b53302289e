//! Shared HTTP plumbing for provider clients.
//!
//! Status checking, JSON body parsing with the same error vocabulary for
//! every backend, and streaming downloads through a `.part` file.

use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{ProgressFn, ProviderError};

/// User agent sent to every backend.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// reqwest client plus the deadline applied to API calls.
///
/// The underlying client only bounds connecting and idle reads, so audio
/// downloads may run as long as bytes keep arriving. JSON requests made
/// through [`HttpClient::get`] get a total deadline on top.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    api_timeout: Duration,
}

impl HttpClient {
    /// GET with the API deadline.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.inner.get(url).timeout(self.api_timeout)
    }

    /// GET bounded only by the connect and idle-read timeouts.
    pub fn download(&self, url: &str) -> reqwest::RequestBuilder {
        self.inner.get(url)
    }
}

/// Build a client; `timeout` bounds connects, idle reads and API calls.
pub fn client(timeout: Duration) -> Result<HttpClient, ProviderError> {
    let builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .read_timeout(timeout);

    // Tests talk to a loopback server
    #[cfg(test)]
    let builder = builder.no_proxy();

    let inner = builder
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    Ok(HttpClient {
        inner,
        api_timeout: timeout,
    })
}

/// Send a request, mapping transport errors and non-success statuses.
pub async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }
    Ok(response)
}

/// Read a response body as text, rejecting empty bodies.
pub async fn body_text(response: reqwest::Response) -> Result<String, ProviderError> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyBody);
    }
    Ok(text)
}

/// Parse a non-empty JSON body.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyBody);
    }
    serde_json::from_str(text).map_err(|e| ProviderError::InvalidJson(e.to_string()))
}

/// GET a URL and parse the JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &HttpClient,
    url: &str,
) -> Result<T, ProviderError> {
    tracing::debug!("GET {}", url);
    let response = send(client.get(url)).await?;
    let text = body_text(response).await?;
    parse_json(&text)
}

/// `<path>.part`, the in-progress name for a download.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Stream `url` to `destination`.
///
/// Bytes go to `<destination>.part` first and are renamed over the final
/// path only once the body is complete and non-empty. Returns the number of
/// bytes written.
pub async fn stream_to_file(
    client: &HttpClient,
    url: &str,
    destination: &Path,
    progress: &ProgressFn,
) -> Result<u64, ProviderError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = send(client.download(url)).await?;
    let total = response.content_length().unwrap_or(0);
    let temp = part_path(destination);

    let result = write_stream(response, &temp, total, progress).await;
    let written = match result {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
    };

    if written == 0 {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ProviderError::EmptyFile(destination.to_path_buf()));
    }

    tokio::fs::rename(&temp, destination).await?;
    tracing::debug!("Wrote {} bytes to {:?}", written, destination);
    Ok(written)
}

async fn write_stream(
    response: reqwest::Response,
    temp: &Path,
    total: u64,
    progress: &ProgressFn,
) -> Result<u64, ProviderError> {
    let mut file = tokio::fs::File::create(temp).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProviderError::Network(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress(written, total);
    }

    file.flush().await?;
    Ok(written)
}
