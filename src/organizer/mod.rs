//! Filename formatting and on-disk layout.
//!
//! Turns a [`TrackDescriptor`] plus a template such as
//! `{track} - {title}` into a sanitized, `.flac`-qualified filename, and
//! decides which folder each track of a batch lands in.
//!
//! # Template modes
//! - **Token mode** (template contains `{`): `{title}`, `{artist}`, `{album}`,
//!   `{track}`/`{track_number}`, `{date}`, `{year}`, `{position}`, `{isrc}`,
//!   `{duration}`. Unknown tokens are left verbatim.
//! - **Preset mode**: `title_artist`, `artist_title`, `title_only`.
//!
//! Substituted values never contain `<>:"/\|?*`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::{BatchContext, GroupingMode, TrackDescriptor};

/// Extension every canonical filename carries.
pub const CANONICAL_EXTENSION: &str = ".flac";

const FORBIDDEN: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Expand a preset name into its token template.
fn preset_template(template: &str) -> Option<&'static str> {
    match template {
        "title_artist" => Some("{title} - {artist}"),
        "artist_title" => Some("{artist} - {title}"),
        "title_only" => Some("{title}"),
        _ => None,
    }
}

/// Sanitize one filename component.
///
/// `"` becomes `'`, the other forbidden characters become `_`, whitespace
/// runs collapse to a single space and the result is trimmed.
pub fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if FORBIDDEN.contains(&c) => '_',
            c => c,
        })
        .collect();
    collapse_whitespace(&replaced)
}

/// Sanitize a folder name: every forbidden character becomes `_`.
pub fn sanitize_folder(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `MM:SS` from a millisecond duration.
pub fn format_duration(duration_ms: u64) -> String {
    let total = duration_ms / 1000;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Track number used in names: the track's own number, else the batch position.
fn effective_number(track: &TrackDescriptor, position: usize) -> usize {
    if track.track_number > 0 {
        track.track_number as usize
    } else {
        position
    }
}

fn token_value(token: &str, track: &TrackDescriptor, position: usize) -> Option<String> {
    let value = match token {
        "title" => track.title.clone(),
        "artist" => track.artist_display(),
        "album" => track.album.clone(),
        "track_number" | "track" => format!("{:02}", effective_number(track, position)),
        "date" => track.release_date.clone(),
        "year" => track.year().to_string(),
        "position" => format!("{:02}", position),
        "isrc" => track.isrc.clone(),
        "duration" => format_duration(track.duration_ms),
        _ => return None,
    };
    Some(sanitize_component(&value))
}

/// Substitute `{token}`s, leaving unknown tokens and unmatched braces as-is.
fn substitute(template: &str, track: &TrackDescriptor, position: usize) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let token = &after[..close];
                match token_value(token, track, position) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(token);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Append `.flac` unless the name already ends with it (any case).
pub fn with_canonical_extension(name: &str) -> String {
    if name.to_lowercase().ends_with(CANONICAL_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, CANONICAL_EXTENSION)
    }
}

/// Format the canonical filename for a track.
///
/// `position` is the 1-based index of the track in its batch and stands in
/// for a missing track number.
pub fn format_filename(template: &str, track: &TrackDescriptor, position: usize) -> String {
    let expanded = if let Some(preset) = preset_template(template) {
        substitute(preset, track, position)
    } else if template.contains('{') {
        substitute(template, track, position)
    } else {
        sanitize_component(template)
    };

    collapse_whitespace(&with_canonical_extension(&expanded))
}

/// True when a template already renders a track or position number.
fn template_has_number(template: &str) -> bool {
    ["{track}", "{track_number}", "{position}"]
        .iter()
        .any(|t| template.contains(t))
}

/// Canonical filename honouring the batch's numbering toggle.
pub fn canonical_filename(ctx: &BatchContext, track: &TrackDescriptor, position: usize) -> String {
    let name = format_filename(&ctx.layout.filename_format, track, position);
    if ctx.layout.numbered_filenames && !template_has_number(&ctx.layout.filename_format) {
        format!("{:02} - {}", effective_number(track, position), name)
    } else {
        name
    }
}

/// Root folder for a batch: the output directory, plus the collection folder
/// in album and playlist mode.
pub fn collection_dir(ctx: &BatchContext) -> PathBuf {
    match ctx.mode {
        GroupingMode::Single => ctx.output_dir.clone(),
        GroupingMode::Album | GroupingMode::Playlist => {
            ctx.output_dir.join(sanitize_folder(&ctx.collection_name))
        }
    }
}

/// Folder a given track lands in. Artist and album subfolders only apply to
/// playlists.
pub fn track_dir(ctx: &BatchContext, root: &Path, track: &TrackDescriptor) -> PathBuf {
    let mut dir = root.to_path_buf();
    if ctx.mode == GroupingMode::Playlist {
        if ctx.layout.artist_subfolders {
            dir.push(sanitize_folder(track.primary_artist()));
        }
        if ctx.layout.album_subfolders {
            dir.push(sanitize_folder(&track.album));
        }
    }
    dir
}

/// Final path for a provider result: the canonical path with the result's
/// real extension.
pub fn destination_for(canonical: &Path, produced: &Path) -> PathBuf {
    match produced.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.eq_ignore_ascii_case("flac") => canonical.with_extension(ext),
        _ => canonical.to_path_buf(),
    }
}

/// True when `path` exists and is non-empty.
pub fn is_complete(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Move `source` to `destination`, replacing whatever is there.
pub fn replace_file(source: &Path, destination: &Path) -> io::Result<()> {
    if source == destination {
        return Ok(());
    }

    if destination.exists() {
        fs::remove_file(destination)?;
    }

    if fs::rename(source, destination).is_err() {
        // Cross-device: copy then delete
        fs::copy(source, destination)?;
        fs::remove_file(source)?;
    }
    Ok(())
}
