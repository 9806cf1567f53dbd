use crate::episode::{Episode, EpisodeDefaults};
use crate::feed::json::ConverterResponse;
use crate::feed::xml::{ChannelInfo, XmlDocument};

/// Maps one upstream item, plus its parent feed context, to an [`Episode`].
///
/// Implemented by the markup (`XmlItem`) and structured (`JsonItem`) item
/// shapes so both sources share the same filtering path.
pub trait NormalizeItem {
    /// Feed-level values an item falls back to.
    type Context;

    fn normalize(&self, context: &Self::Context, defaults: &EpisodeDefaults) -> Episode;
}

/// Normalizes items in upstream order and drops those without audio.
pub fn playable<'a, I>(
    items: impl IntoIterator<Item = &'a I>,
    context: &I::Context,
    defaults: &EpisodeDefaults,
) -> Vec<Episode>
where
    I: NormalizeItem + 'a,
{
    items
        .into_iter()
        .map(|item| item.normalize(context, defaults))
        .filter(Episode::is_playable)
        .collect()
}

/// What a strategy retrieved before normalization.
#[derive(Debug, Clone)]
pub enum RawFeed {
    /// Feed markup fetched directly or through the relay.
    Markup(XmlDocument),
    /// Pre-converted data from the hosted conversion service.
    Structured(ConverterResponse),
}

impl RawFeed {
    /// Number of upstream items, playable or not.
    pub fn item_count(&self) -> usize {
        match self {
            RawFeed::Markup(doc) => doc.items().len(),
            RawFeed::Structured(response) => response.items.len(),
        }
    }

    /// Episodes with a resolvable audio URL, in upstream order.
    pub fn playable_episodes(&self, defaults: &EpisodeDefaults) -> Vec<Episode> {
        match self {
            RawFeed::Markup(doc) => {
                let channel = ChannelInfo::from_document(doc);
                playable(&doc.items(), &channel, defaults)
            }
            RawFeed::Structured(response) => playable(&response.items, &response.feed, defaults),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ITEMS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><title>A</title><itunes:duration>600</itunes:duration>
    <enclosure url="https://x/a.mp3" type="audio/mpeg"/></item>
  <item><title>B</title></item>
</channel></rss>"#;

    #[test]
    fn test_markup_filters_items_without_enclosure() {
        let raw = RawFeed::Markup(XmlDocument::parse(TWO_ITEMS).unwrap());
        assert_eq!(raw.item_count(), 2);

        let episodes = raw.playable_episodes(&EpisodeDefaults::default());
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "A");
        assert_eq!(episodes[0].audio_url, "https://x/a.mp3");
        assert_eq!(episodes[0].duration, "10 min");
    }

    #[test]
    fn test_structured_filters_items_without_enclosure() {
        let response: ConverterResponse = serde_json::from_str(
            r#"{"status":"ok","feed":{"title":"Show"},"items":[
                {"title":"A","enclosure":{"link":"https://x/a.mp3","duration":600}},
                {"title":"B","enclosure":{}}
            ]}"#,
        )
        .unwrap();
        let raw = RawFeed::Structured(response);
        assert_eq!(raw.item_count(), 2);

        let episodes = raw.playable_episodes(&EpisodeDefaults::default());
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].duration, "10 min");
    }
}
