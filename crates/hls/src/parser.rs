//! Permissive HLS playlist parser.
//!
//! The parser never fails: unknown directives are ignored and malformed
//! attribute values fall back to their defaults. Only the directives needed to
//! locate variants and segments are interpreted.

use crate::playlist::{Playlist, Resolution, Segment, Variant};
use crate::resolve::resolve_url;
use tracing::trace;

const TAG_STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const TAG_EXTINF: &str = "#EXTINF:";
const TAG_DISCONTINUITY: &str = "#EXT-X-DISCONTINUITY";
const TAG_ENDLIST: &str = "#EXT-X-ENDLIST";
const TAG_PLAYLIST_TYPE: &str = "#EXT-X-PLAYLIST-TYPE:";
const TAG_VERSION: &str = "#EXT-X-VERSION:";
const TAG_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const TAG_MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";

/// Directive waiting for its URL line.
enum Pending {
    Variant(Vec<(String, String)>),
    Segment {
        duration: f64,
        title: Option<String>,
    },
}

/// Parse HLS playlist text into a [`Playlist`].
///
/// When `base_url` is given, variant and segment URLs are resolved against it.
pub fn parse(content: &str, base_url: Option<&str>) -> Playlist {
    let mut playlist = Playlist::default();
    let mut segments = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut pending_discontinuity = false;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(attrs) = line.strip_prefix(TAG_STREAM_INF) {
            playlist.is_master = true;
            pending = Some(Pending::Variant(parse_attribute_list(attrs)));
        } else if let Some(value) = line.strip_prefix(TAG_EXTINF) {
            pending = parse_extinf(value);
        } else if line == TAG_DISCONTINUITY {
            pending_discontinuity = true;
        } else if line.starts_with(TAG_ENDLIST) {
            playlist.is_live = Some(false);
        } else if let Some(value) = line.strip_prefix(TAG_PLAYLIST_TYPE) {
            playlist.is_live = Some(value.trim() != "VOD");
        } else if let Some(value) = line.strip_prefix(TAG_VERSION) {
            playlist.version = parse_integer(value).or(playlist.version);
        } else if let Some(value) = line.strip_prefix(TAG_TARGET_DURATION) {
            playlist.target_duration = parse_integer(value).or(playlist.target_duration);
        } else if let Some(value) = line.strip_prefix(TAG_MEDIA_SEQUENCE) {
            playlist.media_sequence = parse_integer(value).or(playlist.media_sequence);
        } else if line.starts_with('#') {
            // Comments and directives we don't interpret.
        } else {
            let url = match base_url {
                Some(base) => resolve_url(line, base),
                None => line.to_string(),
            };
            match pending.take() {
                Some(Pending::Variant(attrs)) => {
                    playlist.variants.push(build_variant(url, &attrs));
                }
                Some(Pending::Segment { duration, title }) => {
                    let discontinuity = std::mem::take(&mut pending_discontinuity);
                    segments.push(Segment {
                        url,
                        duration,
                        index: segments.len(),
                        discontinuity: discontinuity.then_some(true),
                        title,
                    });
                }
                None => trace!(line, "URL line without a preceding directive"),
            }
        }
    }

    if !segments.is_empty() && playlist.is_live.is_none() {
        playlist.is_live = Some(true);
    }
    if !playlist.is_master {
        playlist.segments = Some(segments);
    }

    playlist
}

fn parse_extinf(value: &str) -> Option<Pending> {
    let (duration_str, title) = match value.split_once(',') {
        Some((duration, title)) => (duration, Some(title.trim())),
        None => (value, None),
    };
    let duration = duration_str.trim().parse::<f64>().ok()?;
    if !(duration > 0.0 && duration.is_finite()) {
        return None;
    }
    Some(Pending::Segment {
        duration,
        title: title.filter(|t| !t.is_empty()).map(str::to_string),
    })
}

fn parse_integer(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

/// Split an attribute list on commas that are not inside double quotes.
///
/// Keys are upper-cased; values have their surrounding quotes removed.
pub(crate) fn parse_attribute_list(input: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push_attribute(&mut attributes, &input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_attribute(&mut attributes, &input[start..]);

    attributes
}

fn push_attribute(attributes: &mut Vec<(String, String)>, pair: &str) {
    let Some((key, value)) = pair.split_once('=') else {
        return;
    };
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    attributes.push((key.to_ascii_uppercase(), value.to_string()));
}

fn build_variant(url: String, attrs: &[(String, String)]) -> Variant {
    let get = |name: &str| {
        attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    Variant {
        url,
        bandwidth: get("BANDWIDTH")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        resolution: get("RESOLUTION").and_then(parse_resolution),
        codecs: get("CODECS").map(str::to_string),
        framerate: get("FRAME-RATE").and_then(|v| v.parse().ok()),
        program_id: get("PROGRAM-ID").and_then(|v| v.parse().ok()),
    }
}

fn parse_resolution(value: &str) -> Option<Resolution> {
    let (width, height) = value.split_once('x')?;
    Some(Resolution::new(
        width.trim().parse().ok()?,
        height.trim().parse().ok()?,
    ))
}
