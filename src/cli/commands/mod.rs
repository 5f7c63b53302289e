//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `download`: Resolve a catalog URL and download every track
//! - `resolve`: Print the tracks a URL resolves to
//! - `tools`: Check for ffmpeg / ffprobe
//! - `settings`: Show or create the config file

mod download;
mod resolve;
mod settings;
mod tools;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::catalog::{self, CatalogApi, Resolved, SpotifyClient};
use crate::config::Config;
use crate::error::{Error, Result};

pub use download::{DownloadArgs, cmd_download};
pub use resolve::cmd_resolve;
pub use settings::cmd_config;
pub use tools::cmd_check_tools;

/// Lossless downloader for catalog tracks, albums and playlists
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Download a track, album or playlist
    Download(DownloadArgs),
    /// Show the tracks a URL resolves to, without downloading
    Resolve {
        /// Catalog URL (track, album or playlist)
        url: String,
        /// Read catalog JSON from this file instead of the API
        #[arg(long)]
        metadata_file: Option<PathBuf>,
        /// Print the descriptors as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Check if ffmpeg and ffprobe are installed
    CheckTools,
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Catalog API credentials; override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Spotify client ID
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,
    /// Spotify client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

impl CatalogArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(id) = &self.client_id {
            config.credentials.client_id = Some(id.clone());
        }
        if let Some(secret) = &self.client_secret {
            config.credentials.client_secret = Some(secret.clone());
        }
    }
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified (meaning usage should be printed).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let rt = Runtime::new()?;

    match &cli.command {
        Some(Commands::Download(args)) => {
            cmd_download(&rt, args)?;
            Ok(true)
        }
        Some(Commands::Resolve {
            url,
            metadata_file,
            json,
            catalog,
        }) => {
            cmd_resolve(&rt, url, metadata_file.as_deref(), *json, catalog)?;
            Ok(true)
        }
        Some(Commands::CheckTools) => {
            cmd_check_tools()?;
            Ok(true)
        }
        Some(Commands::Config { init }) => {
            cmd_config(*init)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Catalog client, unless metadata comes from a file.
pub(crate) fn catalog_client(
    config: &Config,
    metadata_file: Option<&Path>,
) -> anyhow::Result<Option<SpotifyClient>> {
    if metadata_file.is_some() {
        return Ok(None);
    }
    let client = SpotifyClient::new(&config.credentials, config.download.timeout())?;
    Ok(Some(client))
}

/// Fetch and resolve the catalog entity behind `url`.
pub(crate) async fn fetch_tracks(
    url: &str,
    metadata_file: Option<&Path>,
    catalog: Option<&dyn CatalogApi>,
) -> Result<Resolved> {
    let target = catalog::parse_url(url)?;

    let raw = match (metadata_file, catalog) {
        (Some(path), _) => catalog::load_metadata_file(path)?,
        (None, Some(api)) => api.fetch(&target).await?,
        (None, None) => {
            return Err(Error::config(
                "No catalog source: pass --metadata-file or set credentials",
            ));
        }
    };

    Ok(catalog::resolve(&raw, target.kind)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spotify::mocks::FixedCatalog;
    use crate::providers::ProviderKind;
    use serde_json::json;

    #[test]
    fn test_parse_download_args() {
        let cli = Cli::try_parse_from([
            "flacfetch",
            "download",
            "https://open.spotify.com/album/abc",
            "/music",
            "--service",
            "qobuz",
            "tidal",
            "--use-track-numbers",
            "--loop",
            "30",
        ])
        .unwrap();

        let Some(Commands::Download(args)) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.services, vec![ProviderKind::Qobuz, ProviderKind::Tidal]);
        assert!(args.use_track_numbers);
        assert_eq!(args.loop_minutes, Some(30));
        assert_eq!(args.output_dir, PathBuf::from("/music"));
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let result = Cli::try_parse_from([
            "flacfetch",
            "download",
            "https://open.spotify.com/track/abc",
            "/music",
            "--service",
            "napster",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::try_parse_from(["flacfetch"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_catalog_args_override_config() {
        let mut config = Config::default();
        let args = CatalogArgs {
            client_id: Some("cli-id".into()),
            client_secret: None,
        };
        args.apply(&mut config);
        assert_eq!(config.credentials.client_id.as_deref(), Some("cli-id"));
        assert!(config.credentials.client_secret.is_none());
    }

    #[tokio::test]
    async fn test_fetch_tracks_from_api() {
        let catalog = FixedCatalog(json!({
            "name": "Mix",
            "tracks": {"items": [{"track": {"id": "t1", "name": "One"}}]}
        }));

        let resolved = fetch_tracks(
            "https://open.spotify.com/playlist/pl1",
            None,
            Some(&catalog),
        )
        .await
        .unwrap();
        assert_eq!(resolved.collection_name, "Mix");
        assert_eq!(resolved.tracks[0].title, "One");
    }

    #[tokio::test]
    async fn test_fetch_tracks_needs_a_source() {
        let err = fetch_tracks("https://open.spotify.com/track/t1", None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No catalog source"));
    }
}
