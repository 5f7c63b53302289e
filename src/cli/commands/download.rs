//! The `download` command: resolve, download, report, optionally repeat.

use clap::Args;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};

use super::{CatalogArgs, catalog_client, fetch_tracks};
use crate::catalog::CatalogApi;
use crate::config::{self, Config};
use crate::downloader::{
    BatchReport, DownloadError, DownloadEvent, Downloader, format_minutes, write_failures,
};
use crate::error::{Error, Result, ResultExt};
use crate::media::{Ffmpeg, MediaTool};
use crate::metadata::{Embedder, TagWriter};
use crate::model::LayoutOptions;
use crate::providers::{Provider, ProviderKind, TrackSource};
use crate::scheduler::{self, LoopExit};

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Catalog URL (track, album or playlist)
    pub url: String,

    /// Existing directory to download into
    pub output_dir: PathBuf,

    /// Services to try, in order (default from config: tidal amazon)
    #[arg(short, long = "service", num_args = 1..)]
    pub services: Vec<ProviderKind>,

    /// Filename template, e.g. "{track_number} - {title}" or a preset
    /// (title_artist, artist_title, title_only)
    #[arg(short, long)]
    pub filename_format: Option<String>,

    /// Prefix filenames with the track number
    #[arg(long)]
    pub use_track_numbers: bool,

    /// Playlists: one folder per primary artist
    #[arg(long)]
    pub use_artist_subfolders: bool,

    /// Playlists: one folder per album
    #[arg(long)]
    pub use_album_subfolders: bool,

    /// Run again every N minutes until interrupted
    #[arg(long = "loop", value_name = "MINUTES")]
    pub loop_minutes: Option<u64>,

    /// Read catalog JSON from this file instead of the API
    #[arg(long)]
    pub metadata_file: Option<PathBuf>,

    /// Write failed tracks to this JSON file after each run
    #[arg(long)]
    pub failures_file: Option<PathBuf>,

    #[command(flatten)]
    pub catalog: CatalogArgs,
}

impl DownloadArgs {
    /// Services from the flags, else from config. Unknown config names are skipped.
    fn services(&self, config: &Config) -> Vec<ProviderKind> {
        if !self.services.is_empty() {
            return self.services.clone();
        }
        config
            .download
            .services
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!("Ignoring configured service: {}", e);
                    None
                }
            })
            .collect()
    }

    fn layout(&self, config: &Config) -> LayoutOptions {
        LayoutOptions {
            filename_format: self
                .filename_format
                .clone()
                .unwrap_or_else(|| config.download.filename_format.clone()),
            numbered_filenames: self.use_track_numbers,
            artist_subfolders: self.use_artist_subfolders,
            album_subfolders: self.use_album_subfolders,
        }
    }

    fn interval(&self) -> Option<Duration> {
        self.loop_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m * 60))
    }
}

/// Download everything a catalog URL points at
pub fn cmd_download(rt: &Runtime, args: &DownloadArgs) -> anyhow::Result<()> {
    let mut config = config::load();
    args.catalog.apply(&mut config);

    let services = args.services(&config);
    if services.is_empty() {
        anyhow::bail!("No download services selected");
    }
    if !args.output_dir.is_dir() {
        return Err(DownloadError::OutputDirMissing(args.output_dir.clone()).into());
    }

    let media: Arc<dyn MediaTool> = Arc::new(Ffmpeg::from_config(&config.tools));
    let catalog = catalog_client(&config, args.metadata_file.as_deref())?;
    let providers = services
        .iter()
        .map(|kind| Provider::from_config(*kind, &config, media.clone()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let embedder = TagWriter::new(config.download.timeout())?;

    let services_line = services
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    println!("Services: {}", services_line);

    let exit = rt.block_on(async {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(event_rx));
        let downloader = Downloader::new(providers, embedder)
            .with_events(event_tx);

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = stop_tx.send(true);
            }
        });

        let exit = {
            let downloader = &downloader;
            let config = &config;
            let catalog = catalog.as_ref().map(|c| c as &dyn CatalogApi);
            scheduler::run_loop(args.interval(), stop_rx, move |_| {
                run_cycle(args, config, catalog, downloader)
            })
            .await
        };

        // Closing the event channel lets the printer drain and stop
        drop(downloader);
        let _ = printer.await;

        exit
    });

    match exit {
        LoopExit::Interrupted => {
            println!("\nDownload stopped by user.");
            Ok(())
        }
        LoopExit::Completed => Ok(()),
        LoopExit::Stopped(e) => Err(e.into()),
    }
}

/// One resolve + download pass.
///
/// Ordinary errors are printed so a looping run survives a bad cycle. A
/// missing output directory breaks the loop.
async fn run_cycle<S: TrackSource, E: Embedder>(
    args: &DownloadArgs,
    config: &Config,
    catalog: Option<&dyn CatalogApi>,
    downloader: &Downloader<S, E>,
) -> ControlFlow<Error> {
    match cycle(args, config, catalog, downloader).await {
        Ok(report) => print_summary(&report),
        Err(e) if is_fatal(&e) => return ControlFlow::Break(e),
        Err(e) => println!("Error: {}", e),
    }
    announce_next(args);
    ControlFlow::Continue(())
}

fn is_fatal(error: &Error) -> bool {
    matches!(
        error,
        Error::Download(DownloadError::OutputDirMissing(_) | DownloadError::NoServices)
    )
}

async fn cycle<S: TrackSource, E: Embedder>(
    args: &DownloadArgs,
    config: &Config,
    catalog: Option<&dyn CatalogApi>,
    downloader: &Downloader<S, E>,
) -> Result<BatchReport> {
    println!("Just a moment. Fetching metadata...");
    let resolved = fetch_tracks(&args.url, args.metadata_file.as_deref(), catalog).await?;

    let mut batch = resolved
        .into_batch(&args.output_dir, args.layout(config))
        .with_context("building batch")?;
    let report = downloader.run(&mut batch).await?;

    if let Some(path) = &args.failures_file {
        let written = write_failures(path, &args.url, &report.failures)
            .with_context(format!("writing {}", path.display()))?;
        println!("Failure report written to {}", written.display());
    }
    Ok(report)
}

fn announce_next(args: &DownloadArgs) {
    if let Some(minutes) = args.loop_minutes.filter(|m| *m > 0) {
        println!("\nDownload starting again in: {}", format_minutes(minutes));
        println!("\n=======================================");
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n=======================================");
    println!("\nStatus: {}", report.message);
    println!(
        "Downloaded: {}, already present: {}, failed: {}",
        report.downloaded,
        report.skipped,
        report.failures.len()
    );

    if !report.failures.is_empty() {
        println!("\nFailed downloads:");
        for failure in &report.failures {
            println!("• {} - {}", failure.title, failure.artists);
            println!("  Error: {}\n", failure.error);
        }
    }

    println!(
        "\nElapsed time for this download loop: {}",
        report.elapsed_display()
    );
}

async fn print_events(mut events: mpsc::UnboundedReceiver<DownloadEvent>) {
    let mut last_percent = None;

    while let Some(event) = events.recv().await {
        match event {
            DownloadEvent::TrackStarted {
                position,
                total,
                title,
                artists,
            } => {
                println!("\n[{}/{}] Starting download: {} - {}", position, total, title, artists);
            }
            DownloadEvent::AlreadyExists { path } => {
                println!("File already exists: {}. Skipping download.", path.display());
            }
            DownloadEvent::Trying { service } => {
                last_percent = None;
                println!("Trying {}...", service);
            }
            DownloadEvent::Progress { done, total } => {
                if let Some(line) = progress_line(done, total, &mut last_percent) {
                    print!("\r{}", line);
                    let _ = std::io::stdout().flush();
                }
            }
            DownloadEvent::Saved { service, path } => {
                println!("\n✓ {}: {}", service, path.display());
            }
            DownloadEvent::TrackFailed { title, error } => {
                println!("✗ Failed: {} ({})", title, error);
            }
            DownloadEvent::ServiceFailed { .. }
            | DownloadEvent::EmbedFailed { .. }
            | DownloadEvent::Finished { .. } => {}
        }
    }
}

/// Progress text, only when the displayed value changes.
fn progress_line(done: u64, total: u64, last: &mut Option<u64>) -> Option<String> {
    let (key, line) = if total > 0 {
        let percent = done.saturating_mul(100) / total;
        (percent, format!("Download progress: {}%", percent))
    } else {
        let mb = done / (1024 * 1024);
        (mb, format!("Downloaded: {} MB", mb))
    };

    if *last == Some(key) {
        return None;
    }
    *last = Some(key);
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mocks::RecordingEmbedder;
    use crate::providers::mocks::MockSource;
    use clap::Parser;
    use tempfile::tempdir;

    fn args(extra: &[&str]) -> DownloadArgs {
        let mut argv = vec!["flacfetch", "download"];
        argv.extend_from_slice(extra);
        match super::super::Cli::try_parse_from(argv).unwrap().command {
            Some(super::super::Commands::Download(args)) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_services_fall_back_to_config() {
        let a = args(&["https://open.spotify.com/track/x", "/out"]);
        let mut config = Config::default();
        config.download.services = vec!["deezer".into(), "bogus".into(), "amazon".into()];
        assert_eq!(
            a.services(&config),
            vec![ProviderKind::Deezer, ProviderKind::Amazon]
        );
    }

    #[test]
    fn test_layout_from_flags() {
        let a = args(&[
            "https://open.spotify.com/track/x",
            "/out",
            "--filename-format",
            "artist_title",
            "--use-album-subfolders",
        ]);
        let layout = a.layout(&Config::default());
        assert_eq!(layout.filename_format, "artist_title");
        assert!(layout.album_subfolders);
        assert!(!layout.artist_subfolders);
        assert!(!layout.numbered_filenames);
    }

    #[test]
    fn test_zero_loop_means_once() {
        assert!(args(&["u", "/out", "--loop", "0"]).interval().is_none());
        assert_eq!(
            args(&["u", "/out", "--loop", "2"]).interval(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_progress_line_throttles() {
        let mut last = None;
        assert_eq!(
            progress_line(50, 100, &mut last).as_deref(),
            Some("Download progress: 50%")
        );
        assert!(progress_line(50, 100, &mut last).is_none());
        assert!(progress_line(51, 100, &mut last).is_some());
        assert_eq!(
            progress_line(3 * 1024 * 1024, 0, &mut last).as_deref(),
            Some("Downloaded: 3 MB")
        );
    }

    #[tokio::test]
    async fn test_cycle_from_metadata_file() {
        let dir = tempdir().unwrap();
        let metadata = dir.path().join("album.json");
        std::fs::write(
            &metadata,
            r#"{"album_info": {"name": "Album"}, "track_list": [
                {"id": "a", "name": "One", "artists": [{"name": "X"}], "track_number": 1},
                {"id": "b", "name": "Two", "artists": [{"name": "X"}], "track_number": 2}
            ]}"#,
        )
        .unwrap();
        let out = dir.path().join("music");
        std::fs::create_dir(&out).unwrap();
        let failures = dir.path().join("failed.json");

        let a = args(&[
            "https://open.spotify.com/album/abc",
            out.to_str().unwrap(),
            "--metadata-file",
            metadata.to_str().unwrap(),
            "--failures-file",
            failures.to_str().unwrap(),
            "--use-track-numbers",
        ]);
        let downloader = Downloader::new(
            vec![MockSource::succeeding("tidal")],
            RecordingEmbedder::default(),
        );

        let flow = run_cycle(&a, &Config::default(), None, &downloader).await;

        assert!(flow.is_continue());
        assert!(out.join("Album").join("01 - One - X.flac").exists());
        assert!(out.join("Album").join("02 - Two - X.flac").exists());
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&failures).unwrap()).unwrap();
        assert!(report["failures"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_output_dir_stops_the_loop() {
        let dir = tempdir().unwrap();
        let metadata = dir.path().join("track.json");
        std::fs::write(&metadata, r#"{"track": {"id": "a", "name": "One"}}"#).unwrap();
        let missing = dir.path().join("nowhere");

        let a = args(&[
            "https://open.spotify.com/track/a",
            missing.to_str().unwrap(),
            "--metadata-file",
            metadata.to_str().unwrap(),
            "--loop",
            "5",
        ]);
        let downloader = Downloader::new(
            vec![MockSource::succeeding("tidal")],
            RecordingEmbedder::default(),
        );

        let flow = run_cycle(&a, &Config::default(), None, &downloader).await;
        match flow {
            ControlFlow::Break(Error::Download(DownloadError::OutputDirMissing(path))) => {
                assert_eq!(path, missing)
            }
            other => panic!("expected a fatal break, got {:?}", other),
        }
        assert_eq!(downloader.sources()[0].call_count(), 0);
    }

    #[tokio::test]
    async fn test_ordinary_cycle_error_keeps_looping() {
        let dir = tempdir().unwrap();
        let metadata = dir.path().join("broken.json");
        std::fs::write(&metadata, "not json").unwrap();

        let a = args(&[
            "https://open.spotify.com/track/a",
            dir.path().to_str().unwrap(),
            "--metadata-file",
            metadata.to_str().unwrap(),
        ]);
        let downloader = Downloader::new(
            vec![MockSource::succeeding("tidal")],
            RecordingEmbedder::default(),
        );

        assert!(run_cycle(&a, &Config::default(), None, &downloader).await.is_continue());
    }
}
