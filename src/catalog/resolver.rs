//! Raw catalog JSON to [`TrackDescriptor`]s.
//!
//! The input is loosely shaped: it may come straight from the Web API or
//! from a pre-flattened export (`album_info` + `track_list`). Every field
//! is therefore read through a small extraction rule with a fallback order
//! instead of a fixed serde schema.

use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use super::{CatalogError, CatalogKind};
use crate::model::{
    BatchContext, GroupingMode, LayoutOptions, TrackDescriptor, UNKNOWN_ALBUM, UNKNOWN_TITLE,
};

const UNKNOWN_PLAYLIST: &str = "Unknown Playlist";

/// Resolution result: ordered, deduplicated tracks plus grouping.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub tracks: Vec<TrackDescriptor>,
    pub mode: GroupingMode,
    pub collection_name: String,
}

impl Resolved {
    pub fn into_batch(
        self,
        output_dir: impl Into<PathBuf>,
        layout: LayoutOptions,
    ) -> crate::error::Result<BatchContext> {
        BatchContext::new(
            self.tracks,
            output_dir,
            self.mode,
            self.collection_name,
            layout,
        )
    }
}

/// Map raw catalog JSON for an entity of `kind` onto descriptors.
pub fn resolve(raw: &Value, kind: CatalogKind) -> Result<Resolved, CatalogError> {
    let resolved = match kind {
        CatalogKind::Track => resolve_track(raw),
        CatalogKind::Album => resolve_album(raw),
        CatalogKind::Playlist => resolve_playlist(raw),
    };

    if resolved.tracks.is_empty() {
        return Err(CatalogError::Empty(kind.as_str().to_string()));
    }

    tracing::info!(
        "Resolved {} track(s) from {} '{}'",
        resolved.tracks.len(),
        kind.as_str(),
        resolved.collection_name
    );
    Ok(resolved)
}

fn resolve_track(raw: &Value) -> Resolved {
    let data = raw.get("track").filter(|t| t.is_object()).unwrap_or(raw);

    let Some(id) = track_id(data) else {
        tracing::debug!("Skipping track without ID");
        return Resolved {
            tracks: Vec::new(),
            mode: GroupingMode::Single,
            collection_name: String::new(),
        };
    };

    let album = data.get("album");
    let artists = artist_names(data.get("artists"));
    let track = TrackDescriptor {
        url: track_url(&id),
        title: text(data, "name").unwrap_or(UNKNOWN_TITLE).to_string(),
        album: text(data, "album_name")
            .or_else(|| album.and_then(|a| text(a, "name")))
            .unwrap_or(UNKNOWN_ALBUM)
            .to_string(),
        album_artist: album_artist(album, &artists),
        track_number: number(data, "track_number").unwrap_or(1) as u32,
        disc_number: number(data, "disc_number").unwrap_or(1) as u32,
        duration_ms: number(data, "duration_ms").unwrap_or(0),
        isrc: isrc(data),
        release_date: album
            .and_then(|a| text(a, "release_date"))
            .or_else(|| text(data, "release_date"))
            .unwrap_or_default()
            .to_string(),
        cover_url: cover_art(data, true),
        total_tracks: album
            .and_then(|a| number(a, "total_tracks"))
            .unwrap_or(0) as u32,
        copyright: album.and_then(copyright),
        publisher: album.and_then(|a| text(a, "label")).map(str::to_string),
        artists,
        id,
        ..Default::default()
    };

    let collection_name = format!("{} - {}", track.title, track.artist_display());
    Resolved {
        tracks: vec![track],
        mode: GroupingMode::Single,
        collection_name,
    }
}

fn resolve_album(raw: &Value) -> Resolved {
    let info = raw.get("album_info").filter(|i| i.is_object()).unwrap_or(raw);

    let name = text(info, "name")
        .or_else(|| text(raw, "name"))
        .unwrap_or(UNKNOWN_ALBUM)
        .to_string();
    let release_date = text(info, "release_date")
        .or_else(|| text(raw, "release_date"))
        .unwrap_or_default()
        .to_string();
    let album_artist = match info.get("artists").or_else(|| raw.get("artists")) {
        Some(Value::String(s)) => s.clone(),
        other => join_artists(&artist_names(other)),
    };
    let album_cover = cover_art(info, false);
    let copyright = copyright(info);
    let publisher = text(info, "label").map(str::to_string);

    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    for item in track_items(raw) {
        let Some(id) = track_id(item).filter(|id| seen.insert(id.clone())) else {
            continue;
        };

        let cover = cover_art(item, true);
        tracks.push(TrackDescriptor {
            url: track_url(&id),
            title: text(item, "name").unwrap_or(UNKNOWN_TITLE).to_string(),
            artists: artist_names(item.get("artists")),
            album: name.clone(),
            album_artist: album_artist.clone(),
            track_number: number(item, "track_number").unwrap_or(1) as u32,
            disc_number: number(item, "disc_number").unwrap_or(1) as u32,
            duration_ms: number(item, "duration_ms").unwrap_or(0),
            isrc: isrc(item),
            release_date: release_date.clone(),
            cover_url: if cover.is_empty() { album_cover.clone() } else { cover },
            copyright: copyright.clone(),
            publisher: publisher.clone(),
            id,
            ..Default::default()
        });
    }

    let total_tracks = number(info, "total_tracks").map_or(tracks.len() as u32, |n| n as u32);
    let total_discs = tracks.iter().map(|t| t.disc_number).max().unwrap_or(1);
    for track in &mut tracks {
        track.total_tracks = total_tracks;
        track.total_discs = total_discs;
    }

    Resolved {
        tracks,
        mode: GroupingMode::Album,
        collection_name: name,
    }
}

fn resolve_playlist(raw: &Value) -> Resolved {
    let info = raw
        .get("playlist_info")
        .filter(|i| i.is_object())
        .unwrap_or(raw);
    let name = text(info, "name").unwrap_or(UNKNOWN_PLAYLIST).to_string();
    let playlist_cover = cover_art(info, false);

    let mut seen = HashSet::new();
    let mut tracks: Vec<TrackDescriptor> = Vec::new();
    for item in track_items(raw) {
        // Web API wraps each entry as {"added_at": .., "track": {..}}
        let track = match item.get("track") {
            Some(Value::Null) => continue,
            Some(inner) if inner.is_object() => inner,
            _ => item,
        };
        let Some(id) = track_id(track).filter(|id| seen.insert(id.clone())) else {
            continue;
        };

        let album = track.get("album");
        let artists = artist_names(track.get("artists"));
        let cover = cover_art(track, true);
        let position = tracks.len() as u64 + 1;

        tracks.push(TrackDescriptor {
            url: track_url(&id),
            title: text(track, "name").unwrap_or(UNKNOWN_TITLE).to_string(),
            album: album
                .and_then(|a| text(a, "name"))
                .or_else(|| text(track, "album_name"))
                .unwrap_or(UNKNOWN_ALBUM)
                .to_string(),
            album_artist: album_artist(album, &artists),
            track_number: number(track, "track_number").unwrap_or(position) as u32,
            disc_number: number(track, "disc_number").unwrap_or(1) as u32,
            duration_ms: number(track, "duration_ms").unwrap_or(0),
            isrc: isrc(track),
            release_date: album
                .and_then(|a| text(a, "release_date"))
                .unwrap_or_default()
                .to_string(),
            cover_url: if cover.is_empty() { playlist_cover.clone() } else { cover },
            total_tracks: album
                .and_then(|a| number(a, "total_tracks"))
                .unwrap_or(0) as u32,
            artists,
            id,
            ..Default::default()
        });
    }

    Resolved {
        tracks,
        mode: GroupingMode::Playlist,
        collection_name: name,
    }
}

/// `track_list`, else `tracks.items`.
fn track_items(raw: &Value) -> &[Value] {
    raw.get("track_list")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .or_else(|| raw.pointer("/tracks/items").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn number(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

fn track_url(id: &str) -> String {
    format!("https://open.spotify.com/track/{}", id)
}

/// `id`, else the last segment of `external_urls` (string or `{spotify: ..}`).
fn track_id(track: &Value) -> Option<String> {
    if let Some(id) = text(track, "id") {
        return Some(id.to_string());
    }

    let external = match track.get("external_urls")? {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("spotify").and_then(Value::as_str)?,
        _ => return None,
    };
    external
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Cover URL from `images`, optionally recursing into `album`.
fn cover_art(value: &Value, recurse_album: bool) -> String {
    let found = match value.get("images") {
        Some(Value::String(url)) => Some(url.as_str()),
        Some(Value::Array(images)) => match images.first() {
            Some(Value::String(url)) => Some(url.as_str()),
            Some(Value::Object(image)) => image.get("url").and_then(Value::as_str),
            _ => None,
        },
        _ => None,
    };

    match found.filter(|url| !url.is_empty()) {
        Some(url) => url.to_string(),
        None if recurse_album => value
            .get("album")
            .filter(|a| a.is_object())
            .map(|album| cover_art(album, false))
            .unwrap_or_default(),
        None => String::new(),
    }
}

/// Artist names from a list of objects (`name`), a list of strings, or a
/// pre-joined string.
fn artist_names(artists: Option<&Value>) -> Vec<String> {
    match artists {
        Some(Value::Array(list)) => list
            .iter()
            .map(|artist| match artist {
                Value::Object(obj) => obj
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn join_artists(names: &[String]) -> String {
    if names.is_empty() {
        crate::model::UNKNOWN_ARTIST.to_string()
    } else {
        names.join(", ")
    }
}

/// The album's own artists, else the track's.
fn album_artist(album: Option<&Value>, track_artists: &[String]) -> String {
    let own = artist_names(album.and_then(|a| a.get("artists")));
    if own.is_empty() {
        join_artists(track_artists)
    } else {
        join_artists(&own)
    }
}

fn isrc(track: &Value) -> String {
    track
        .pointer("/external_ids/isrc")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| text(track, "isrc"))
        .unwrap_or_default()
        .to_string()
}

fn copyright(album: &Value) -> Option<String> {
    album
        .get("copyrights")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
