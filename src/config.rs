//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\flacfetch\config.toml
//! - macOS: ~/Library/Application Support/flacfetch/config.toml
//! - Linux: ~/.config/flacfetch/config.toml
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Command-line flags override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog API credentials
    pub credentials: Credentials,

    /// Download defaults
    pub download: DownloadConfig,

    pub tidal: TidalConfig,
    pub deezer: DeezerConfig,
    pub qobuz: QobuzConfig,
    pub amazon: AmazonConfig,

    /// External media tools
    pub tools: ToolsConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Spotify Web API client ID
    pub client_id: Option<String>,
    /// Spotify Web API client secret
    pub client_secret: Option<String>,
}

/// Defaults for the `download` command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Provider order used when `--service` is not given
    pub services: Vec<String>,

    /// Filename template
    pub filename_format: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            services: vec!["tidal".to_string(), "amazon".to_string()],
            filename_format: "{title} - {artist}".to_string(),
            timeout_secs: 60,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Tidal-backed lossless API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidalConfig {
    pub api_url: String,
    pub quality: String,
}

impl Default for TidalConfig {
    fn default() -> Self {
        Self {
            api_url: "https://tidal.401658.xyz".to_string(),
            quality: "LOSSLESS".to_string(),
        }
    }
}

/// Deezer lookup and decode backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeezerConfig {
    /// Public Deezer API (ISRC lookup)
    pub api_url: String,
    /// Decode mirror
    pub mirror_url: String,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.deezer.com".to_string(),
            mirror_url: "https://deezmate.com".to_string(),
        }
    }
}

/// Qobuz search plus stream mirrors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QobuzConfig {
    pub app_id: String,
    pub search_url: String,
    /// Standard mirrors; the track ID is appended to each
    pub mirrors: Vec<String>,
    /// Mirror that answers with an obfuscated payload
    pub jumo_url: String,
    /// Requested quality tier: 6 (16-bit), 7 (24-bit) or 27 (24-bit hi-res)
    pub quality: String,
    /// Walk down the quality ladder when the requested tier fails
    pub allow_fallback: bool,
}

impl Default for QobuzConfig {
    fn default() -> Self {
        Self {
            app_id: "798273057".to_string(),
            search_url: "https://www.qobuz.com/api.json/0.2/track/search".to_string(),
            mirrors: vec![
                "https://dab.yeet.su/api/stream?trackId=".to_string(),
                "https://dabmusic.xyz/api/stream?trackId=".to_string(),
                "https://qobuz.squid.wtf/api/download-music?track_id=".to_string(),
            ],
            jumo_url: "https://jumo-dl.pages.dev/get".to_string(),
            quality: "6".to_string(),
            allow_fallback: true,
        }
    }
}

/// Amazon Music via link aggregator and mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmazonConfig {
    pub songlink_url: String,
    pub mirror_url: String,
    pub region: String,
}

impl Default for AmazonConfig {
    fn default() -> Self {
        Self {
            songlink_url: "https://api.song.link/v1-alpha.1/links".to_string(),
            mirror_url: "https://amazon.afkarxyz.fun".to_string(),
            region: "US".to_string(),
        }
    }
}

/// External binaries; `None` searches the usual install locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flacfetch"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit path, writing through a temp file.
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(path.to_path_buf())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[download]"));
        assert!(toml.contains("[qobuz]"));
        assert!(toml.contains("[amazon]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [download]
            services = ["qobuz"]

            [qobuz]
            quality = "27"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.download.services, vec!["qobuz"]);
        assert_eq!(parsed.download.filename_format, "{title} - {artist}");
        assert_eq!(parsed.qobuz.quality, "27");
        assert_eq!(parsed.qobuz.app_id, "798273057");
        assert_eq!(parsed.qobuz.mirrors.len(), 3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.credentials.client_id = Some("abc".to_string());
        config.download.timeout_secs = 15;
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.credentials.client_id, Some("abc".to_string()));
        assert_eq!(loaded.download.timeout(), Duration::from_secs(15));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_unparseable_config_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "download = [[[").unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.download.services, vec!["tidal", "amazon"]);
    }
}
