// HLS (HTTP Live Streaming) playlist handling
pub mod parser;
pub mod playlist;
pub mod resolve;
pub mod selection;

// Export common types for ease of use
pub use parser::parse;
pub use playlist::{Playlist, Resolution, Segment, Variant};
pub use resolve::resolve_url;
pub use selection::{
    Preference, QualityOption, SelectionPolicy, VariantSelector, list_all_qualities,
    quality_label, select_variant,
};
