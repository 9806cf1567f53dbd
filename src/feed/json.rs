//! Structured responses from the hosted feed-to-JSON conversion service.
//!
//! The service answers with
//! `{"status": "ok", "feed": {...}, "items": [{..., "enclosure": {...}}]}`.
//! Every field is optional on the wire; wrongly typed optional values are
//! treated as absent rather than failing the whole response.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::episode::{Episode, EpisodeDefaults};
use crate::feed::normalize::NormalizeItem;
use crate::feed::xml::episode_id;
use crate::util::{clean_inline, format_json_duration, sanitize_description};

/// Value of `status` signalling a usable response.
pub const STATUS_OK: &str = "ok";

/// Response body of the feed-to-JSON conversion service.
///
/// Every field is optional and type-tolerant; a field of the wrong shape
/// reads as its default instead of failing the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConverterResponse {
    pub status: String,
    #[serde(deserialize_with = "lenient")]
    pub feed: JsonFeedMeta,
    #[serde(deserialize_with = "lenient_items")]
    pub items: Vec<JsonItem>,
}

impl ConverterResponse {
    /// Whether the service reported a successful conversion.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Feed-level metadata items fall back to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonFeedMeta {
    pub title: Option<String>,
    pub image: Option<String>,
}

/// One converted feed item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonItem {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub enclosure: JsonEnclosure,
    #[serde(deserialize_with = "lenient")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonEnclosure {
    pub link: Option<String>,
    /// Forwarded unchanged from the feed: seconds as a number, or a string.
    pub duration: Option<serde_json::Value>,
}

/// Deserializes `T`, falling back to `T::default()` when the value has the wrong shape.
///
/// The converter emits `"enclosure": []` for items without media, for instance.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserializes each item on its own so one malformed entry does not discard the rest.
fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<JsonItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<serde_json::Value> = lenient(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed converter item");
                None
            }
        })
        .collect())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl NormalizeItem for JsonItem {
    type Context = JsonFeedMeta;

    fn normalize(&self, feed: &JsonFeedMeta, defaults: &EpisodeDefaults) -> Episode {
        let title = self.title.as_deref().map(clean_inline).unwrap_or_default();
        let audio_url = non_empty(&self.enclosure.link)
            .map(str::to_string)
            .unwrap_or_default();

        let author = non_empty(&self.author)
            .or_else(|| non_empty(&feed.title))
            .map(clean_inline)
            .unwrap_or_else(|| defaults.brand.clone());

        let description = non_empty(&self.description)
            .or_else(|| non_empty(&self.content))
            .map(sanitize_description)
            .unwrap_or_default();

        let image_url = non_empty(&self.thumbnail)
            .or_else(|| non_empty(&feed.image))
            .map(str::to_string)
            .unwrap_or_else(|| defaults.placeholder_image_url.clone());

        let category = self
            .categories
            .iter()
            .map(|c| clean_inline(c))
            .find(|c| !c.is_empty())
            .unwrap_or_else(|| defaults.default_category.clone());

        Episode {
            id: episode_id(self.guid.as_deref(), &title, &audio_url),
            title,
            author,
            description,
            duration: format_json_duration(self.enclosure.duration.as_ref()),
            image_url,
            audio_url,
            category,
        }
    }
}
