//! The `resolve` command: show what a URL would download.

use std::path::Path;
use tokio::runtime::Runtime;

use super::{CatalogArgs, catalog_client, fetch_tracks};
use crate::catalog::{CatalogApi, Resolved};
use crate::config;
use crate::organizer::format_duration;

/// Print the tracks a catalog URL resolves to
pub fn cmd_resolve(
    rt: &Runtime,
    url: &str,
    metadata_file: Option<&Path>,
    json: bool,
    catalog_args: &CatalogArgs,
) -> anyhow::Result<()> {
    let mut config = config::load();
    catalog_args.apply(&mut config);
    let catalog = catalog_client(&config, metadata_file)?;

    let resolved = rt.block_on(fetch_tracks(
        url,
        metadata_file,
        catalog.as_ref().map(|c| c as &dyn CatalogApi),
    ))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved.tracks)?);
    } else {
        print!("{}", render(&resolved));
    }
    Ok(())
}

fn render(resolved: &Resolved) -> String {
    let mut out = format!(
        "{} ({}, {} tracks)\n",
        resolved.collection_name,
        resolved.mode,
        resolved.tracks.len()
    );
    for (i, track) in resolved.tracks.iter().enumerate() {
        let isrc = if track.has_isrc() { track.isrc.as_str() } else { "no ISRC" };
        out.push_str(&format!(
            "{:>3}. {} - {} [{}] {}\n",
            i + 1,
            track.title,
            track.artist_display(),
            format_duration(track.duration_ms),
            isrc
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupingMode;
    use crate::test_utils::track;

    #[test]
    fn test_render_listing() {
        let mut first = track("1", "Song");
        first.duration_ms = 185_000;
        let mut second = track("2", "Other");
        second.isrc.clear();

        let text = render(&Resolved {
            tracks: vec![first, second],
            mode: GroupingMode::Album,
            collection_name: "Test Album".into(),
        });

        assert!(text.starts_with("Test Album (album, 2 tracks)"));
        assert!(text.contains("  1. Song - Test Artist [03:05] USTEST000001"));
        assert!(text.contains("  2. Other - Test Artist [00:00] no ISRC"));
    }
}
