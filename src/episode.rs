//! The canonical episode record every acquisition strategy converges to.
use serde::{Deserialize, Serialize};

/// Artwork used when neither the item nor its channel carries an image.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1497633762265-9d179a990aa6?q=80&w=600&auto=format&fit=crop";

/// Author used when the feed names neither an item author nor a channel owner.
pub const DEFAULT_BRAND: &str = "Playing Books";

/// Category label used when the item carries none.
pub const DEFAULT_CATEGORY: &str = "Podcast";

/// A single playable episode.
///
/// Records are immutable values rebuilt on every pipeline run. Output order
/// follows the upstream feed, so index 0 is the most recent episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Plain text, at most 250 characters plus a trailing `...`.
    #[serde(default)]
    pub description: String,
    /// Human-friendly length such as `"18 min"` or `"1h 5m"`.
    #[serde(default)]
    pub duration: String,
    #[serde(default, alias = "image_url")]
    pub image_url: String,
    #[serde(alias = "audio_url")]
    pub audio_url: String,
    #[serde(default)]
    pub category: String,
}

impl Episode {
    /// An episode is only usable when it carries a media URL.
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}

/// Field values substituted when upstream omits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDefaults {
    pub brand: String,
    pub placeholder_image_url: String,
    pub default_category: String,
}

impl Default for EpisodeDefaults {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}
