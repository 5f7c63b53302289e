//! Batch download orchestration.
//!
//! Walks a [`BatchContext`] in order and, for every track not yet on disk,
//! tries each configured source until one produces a file. The file is moved
//! to its canonical path and tagged. A track that no source can deliver
//! becomes a [`FailureRecord`] and the run continues.
//!
//! Progress is published as [`DownloadEvent`]s on an unbounded channel so
//! the caller decides how to render it.

mod report;

pub use report::{BatchReport, format_minutes, format_seconds, write_failures};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::metadata::Embedder;
use crate::model::{BatchContext, FailureRecord, TrackDescriptor};
use crate::organizer;
use crate::providers::{FetchRequest, ProgressFn, TrackSource, no_progress};

/// Run-level download errors. Everything else is recorded per track.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Output directory does not exist: {0}")]
    OutputDirMissing(PathBuf),

    #[error("No download services configured")]
    NoServices,
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    TrackStarted {
        position: usize,
        total: usize,
        title: String,
        artists: String,
    },
    /// Canonical file already present; nothing fetched
    AlreadyExists { path: PathBuf },
    Trying { service: String },
    /// Bytes received for the current attempt; total 0 means unknown
    Progress { done: u64, total: u64 },
    ServiceFailed { service: String, error: String },
    Saved { service: String, path: PathBuf },
    EmbedFailed { path: PathBuf, error: String },
    TrackFailed { title: String, error: String },
    Finished { downloaded: usize, skipped: usize, failed: usize },
}

pub type EventSender = mpsc::UnboundedSender<DownloadEvent>;

/// Drives the source fallback chain over a batch.
pub struct Downloader<S, E> {
    sources: Vec<S>,
    embedder: E,
    events: Option<EventSender>,
}

impl<S: TrackSource, E: Embedder> Downloader<S, E> {
    /// Sources are tried in the given order.
    pub fn new(sources: Vec<S>, embedder: E) -> Self {
        Self {
            sources,
            embedder,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn sources(&self) -> &[S] {
        &self.sources
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is rendering; keep downloading
            let _ = tx.send(event);
        }
    }

    fn progress_fn(&self) -> ProgressFn {
        match &self.events {
            Some(tx) => {
                let tx = tx.clone();
                Arc::new(move |done, total| {
                    let _ = tx.send(DownloadEvent::Progress { done, total });
                })
            }
            None => no_progress(),
        }
    }

    /// Download every pending track of `ctx`.
    ///
    /// Tracks are marked `downloaded` as they land, so calling this again on
    /// the same context only retries what failed.
    pub async fn run(&self, ctx: &mut BatchContext) -> Result<BatchReport, DownloadError> {
        let started = Instant::now();

        if !ctx.output_dir.is_dir() {
            return Err(DownloadError::OutputDirMissing(ctx.output_dir.clone()));
        }
        if self.sources.is_empty() {
            return Err(DownloadError::NoServices);
        }

        let root = organizer::collection_dir(ctx);
        let total = ctx.tracks.len();
        let mut downloaded = 0;
        let mut skipped = 0;
        let mut failures = Vec::new();

        tracing::info!(
            "Downloading {} {} track(s) into {:?}",
            total,
            ctx.mode,
            root
        );

        for index in 0..total {
            if ctx.tracks[index].downloaded {
                skipped += 1;
                continue;
            }

            let position = index + 1;
            let track = &ctx.tracks[index];
            self.emit(DownloadEvent::TrackStarted {
                position,
                total,
                title: track.title.clone(),
                artists: track.artist_display(),
            });

            let dir = organizer::track_dir(ctx, &root, track);
            let canonical_name = organizer::canonical_filename(ctx, track, position);
            let canonical = dir.join(&canonical_name);

            if let Some(existing) = existing_output(&canonical) {
                tracing::debug!("Already downloaded: {:?}", existing);
                self.emit(DownloadEvent::AlreadyExists { path: existing });
                ctx.tracks[index].downloaded = true;
                skipped += 1;
                continue;
            }

            let outcome = match tokio::fs::create_dir_all(&dir).await {
                Ok(()) => {
                    let request = FetchRequest {
                        track,
                        dir: &dir,
                        canonical_name: &canonical_name,
                        filename_format: &ctx.layout.filename_format,
                        position,
                        progress: self.progress_fn(),
                    };
                    self.try_sources(&request, &canonical).await
                }
                Err(e) => Err(format!("Failed to create folder {:?}: {}", dir, e)),
            };

            match outcome {
                Ok(path) => {
                    self.embed(&path, track).await;
                    ctx.tracks[index].downloaded = true;
                    downloaded += 1;
                }
                Err(error) => {
                    tracing::warn!("Failed: {} - {}: {}", track.title, track.artist_display(), error);
                    self.emit(DownloadEvent::TrackFailed {
                        title: track.title.clone(),
                        error: error.clone(),
                    });
                    failures.push(FailureRecord {
                        title: track.title.clone(),
                        artists: track.artist_display(),
                        error,
                    });
                }
            }
        }

        self.emit(DownloadEvent::Finished {
            downloaded,
            skipped,
            failed: failures.len(),
        });

        Ok(BatchReport {
            success: true,
            message: "Download completed!".to_string(),
            elapsed: started.elapsed(),
            downloaded,
            skipped,
            failures,
        })
    }

    /// Walk the fallback chain; the error is the last source's message.
    async fn try_sources(
        &self,
        request: &FetchRequest<'_>,
        canonical: &Path,
    ) -> Result<PathBuf, String> {
        let mut last_error = String::new();

        for source in &self.sources {
            let service = source.name().to_string();
            tracing::debug!("Trying {} for {}", service, request.track.title);
            self.emit(DownloadEvent::Trying {
                service: service.clone(),
            });

            match self.attempt(source, request, canonical).await {
                Ok(path) => {
                    tracing::info!("Saved {:?} via {}", path, service);
                    self.emit(DownloadEvent::Saved {
                        service,
                        path: path.clone(),
                    });
                    return Ok(path);
                }
                Err(error) => {
                    tracing::warn!("{} failed for {}: {}", service, request.track.title, error);
                    self.emit(DownloadEvent::ServiceFailed {
                        service,
                        error: error.clone(),
                    });
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    /// One source: fetch, verify, then move to the canonical path.
    async fn attempt(
        &self,
        source: &S,
        request: &FetchRequest<'_>,
        canonical: &Path,
    ) -> Result<PathBuf, String> {
        let produced = source.acquire(request).await.map_err(|e| e.to_string())?;

        if !organizer::is_complete(&produced) {
            return Err("File missing after download".to_string());
        }

        let destination = organizer::destination_for(canonical, &produced);
        let (from, to) = (produced.clone(), destination.clone());
        let moved = tokio::task::spawn_blocking(move || organizer::replace_file(&from, &to))
            .await
            .map_err(|e| e.to_string())?;

        if let Err(e) = moved {
            let _ = tokio::fs::remove_file(&produced).await;
            return Err(format!("Failed to rename {:?}: {}", produced, e));
        }
        Ok(destination)
    }

    async fn embed(&self, path: &Path, track: &TrackDescriptor) {
        if let Err(e) = self.embedder.embed(path, track).await {
            tracing::warn!("Metadata embedding failed for {:?}: {}", path, e);
            self.emit(DownloadEvent::EmbedFailed {
                path: path.to_path_buf(),
                error: e.to_string(),
            });
        }
    }
}

/// A finished file at the canonical path, or its `.m4a` sibling for
/// sources that deliver AAC.
fn existing_output(canonical: &Path) -> Option<PathBuf> {
    [canonical.to_path_buf(), canonical.with_extension("m4a")]
        .into_iter()
        .find(|p| organizer::is_complete(p))
}
