use serde::{Deserialize, Serialize};

/// Video frame dimensions declared by a `RESOLUTION` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count, used as the primary quality measure.
    #[inline]
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One alternative stream referenced from a master playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub url: String,
    /// Declared bits per second. Zero when the attribute was missing.
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    pub codecs: Option<String>,
    pub framerate: Option<f64>,
    pub program_id: Option<u64>,
}

impl Variant {
    /// Human readable quality label (e.g. `"720p"`), if the variant declares a resolution.
    pub fn quality_label(&self) -> Option<&'static str> {
        self.resolution.map(|r| crate::selection::quality_label(r.height))
    }
}

/// One fragment of a media playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub url: String,
    /// Duration in seconds taken from the preceding `#EXTINF`.
    pub duration: f64,
    /// Zero-based position in download order. Reassembly is keyed on this value.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discontinuity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Parsed result of one HLS text document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub is_master: bool,
    pub variants: Vec<Variant>,
    pub segments: Option<Vec<Segment>>,
    pub target_duration: Option<u64>,
    pub media_sequence: Option<u64>,
    pub version: Option<u64>,
    pub is_live: Option<bool>,
}

impl Playlist {
    /// Segments of a media playlist, or an empty slice for master/empty documents.
    pub fn segments(&self) -> &[Segment] {
        self.segments.as_deref().unwrap_or_default()
    }

    /// Sum of all declared segment durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments().iter().map(|s| s.duration).sum()
    }

    pub fn is_live(&self) -> bool {
        self.is_live.unwrap_or(false)
    }
}
