// Variant selection: picks one stream out of a master playlist under a policy.

use crate::playlist::{Resolution, Variant};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Which end of the quality ladder to pick from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    /// Largest resolution, then highest bandwidth
    #[default]
    Highest,
    /// Smallest resolution, then lowest bandwidth
    Lowest,
    /// Middle entry of the bandwidth-sorted candidates
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPolicy {
    pub preference: Preference,
    /// Upper bound on declared bandwidth (bits/sec).
    pub max_bandwidth: Option<u64>,
}

impl SelectionPolicy {
    pub fn new(preference: Preference) -> Self {
        Self {
            preference,
            max_bandwidth: None,
        }
    }

    pub fn with_max_bandwidth(mut self, max_bandwidth: u64) -> Self {
        self.max_bandwidth = Some(max_bandwidth);
        self
    }
}

/// Compare two variants by resolution area, falling back to bandwidth when
/// either side has no resolution or the areas are equal.
fn compare_quality(a: &Variant, b: &Variant) -> Ordering {
    if let (Some(ra), Some(rb)) = (a.resolution, b.resolution) {
        let by_area = ra.pixel_area().cmp(&rb.pixel_area());
        if by_area != Ordering::Equal {
            return by_area;
        }
    }
    a.bandwidth.cmp(&b.bandwidth)
}

/// Pick a variant according to `policy`. Returns `None` only for an empty input.
pub fn select_variant<'a>(
    variants: &'a [Variant],
    policy: &SelectionPolicy,
) -> Option<&'a Variant> {
    if variants.is_empty() {
        return None;
    }

    let mut candidates: Vec<&Variant> = match policy.max_bandwidth {
        Some(max) => variants.iter().filter(|v| v.bandwidth <= max).collect(),
        None => variants.iter().collect(),
    };

    if candidates.is_empty() {
        // Every variant exceeds the cap; the cheapest one is still better than nothing.
        let fallback = variants.iter().min_by_key(|v| v.bandwidth);
        debug!(
            max_bandwidth = ?policy.max_bandwidth,
            bandwidth = fallback.map(|v| v.bandwidth),
            "All variants exceed bandwidth cap, using lowest"
        );
        return fallback;
    }

    let selected = match policy.preference {
        Preference::Highest => candidates.into_iter().max_by(|a, b| compare_quality(a, b)),
        Preference::Lowest => candidates.into_iter().min_by(|a, b| compare_quality(a, b)),
        Preference::Auto => {
            candidates.sort_by_key(|v| v.bandwidth);
            candidates.get(candidates.len() / 2).copied()
        }
    };

    if let Some(variant) = selected {
        debug!(
            preference = ?policy.preference,
            bandwidth = variant.bandwidth,
            resolution = ?variant.resolution,
            url = %variant.url,
            "Selected variant"
        );
    }
    selected
}

/// Holds a selection policy so callers can pass one selector around.
#[derive(Debug, Clone, Default)]
pub struct VariantSelector {
    policy: SelectionPolicy,
}

impl VariantSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn select<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant> {
        select_variant(variants, &self.policy)
    }
}

/// Label a vertical resolution the way video players usually present it.
pub fn quality_label(height: u32) -> &'static str {
    match height {
        h if h >= 2160 => "4K",
        h if h >= 1440 => "1440p",
        h if h >= 1080 => "1080p",
        h if h >= 720 => "720p",
        h if h >= 480 => "480p",
        h if h >= 360 => "360p",
        h if h >= 240 => "240p",
        _ => "144p",
    }
}

/// A selectable quality as presented to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityOption {
    pub label: String,
    pub resolution: Resolution,
    pub bandwidth: u64,
    pub url: String,
}

/// All variants that declare a resolution, best first.
///
/// Variants without a resolution are left out of this listing but remain
/// selectable through [`select_variant`].
pub fn list_all_qualities(variants: &[Variant]) -> Vec<QualityOption> {
    let mut options: Vec<QualityOption> = variants
        .iter()
        .filter_map(|v| {
            let resolution = v.resolution?;
            Some(QualityOption {
                label: quality_label(resolution.height).to_string(),
                resolution,
                bandwidth: v.bandwidth,
                url: v.url.clone(),
            })
        })
        .collect();
    options.sort_by(|a, b| b.resolution.pixel_area().cmp(&a.resolution.pixel_area()));
    options
}
