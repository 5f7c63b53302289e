//! flacfetch - lossless downloads for catalog tracks, albums and playlists.
//!
//! Resolves a catalog URL into track descriptors, then tries a chain of
//! download services per track until one delivers. Files are named from a
//! template, sorted into folders and tagged with the catalog metadata.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod media;
pub mod metadata;
pub mod model;
pub mod organizer;
pub mod providers;
pub mod scheduler;
#[cfg(test)]
pub mod test_utils;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("flacfetch=info".parse()?))
        .init();

    if !cli::run_command(&args)? {
        cli::Cli::command().print_help()?;
    }
    Ok(())
}
