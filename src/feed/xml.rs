//! Feed markup: a small element tree plus the XML item normalizer.
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::episode::{Episode, EpisodeDefaults};
use crate::feed::normalize::NormalizeItem;
use crate::util::{clean_inline, format_duration, sanitize_description};

/// SEC-003: Maximum element nesting depth accepted from a feed document.
const MAX_XML_DEPTH: usize = 64;

/// Errors produced while building an [`XmlDocument`].
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("unclosed element <{0}> at end of document")]
    Unclosed(String),
    #[error("document has no root element")]
    Empty,
}

/// Minimal gate applied before parsing: the body must look like feed markup.
pub fn looks_like_feed(body: &str) -> bool {
    body.contains("<rss") || body.contains("<?xml")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its qualified name (`itunes:image`), attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn from_start(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let decoder = reader.decoder();
        let mut attributes = Vec::new();
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(err) => {
                    tracing::debug!(element = %name, error = %err, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            // SEC-002: decode_and_unescape_value only resolves the XML builtins and
            // character references; custom entities are an error here, never expanded.
            let value = match attr.decode_and_unescape_value(decoder) {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push((key, value));
        }
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Attribute value by qualified key (`href`, `xml:lang`).
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements.
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children().find(|c| c.name == name)
    }

    /// First descendant (depth-first, document order) with the given qualified name.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in self.children() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant with the given name, in document order.
    pub fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.children() {
            if child.name == name {
                out.push(child);
            }
            child.find_all(name, out);
        }
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Text content of the first descendant named `name`, empty when absent.
    fn value_of(&self, name: &str) -> String {
        self.find(name).map(XmlElement::text_content).unwrap_or_default()
    }
}

/// A parsed feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Builds the element tree for a feed body.
    ///
    /// Qualified names are kept as written (`itunes:author`), so lookups match
    /// on the prefix the feed uses. Text and CDATA both become text content.
    pub fn parse(content: &str) -> Result<Self, XmlError> {
        // Text runs are kept untrimmed; normalizers collapse whitespace themselves
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if stack.len() >= MAX_XML_DEPTH {
                        return Err(XmlError::MaxDepthExceeded(MAX_XML_DEPTH));
                    }
                    stack.push(XmlElement::from_start(&e, &reader));
                }
                Event::Empty(e) => {
                    let element = XmlElement::from_start(&e, &reader);
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    // Name mismatches are rejected by the reader itself
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        let text = match t.unescape() {
                            Ok(s) => s.into_owned(),
                            Err(_) => String::from_utf8_lossy(&t).into_owned(),
                        };
                        top.children.push(XmlNode::Text(text));
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&c).into_owned();
                        top.children.push(XmlNode::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }
        root.map(|root| Self { root }).ok_or(XmlError::Empty)
    }

    /// The `<channel>` element, if any.
    pub fn channel(&self) -> Option<&XmlElement> {
        if self.root.name == "channel" {
            return Some(&self.root);
        }
        self.root.find("channel")
    }

    /// Every `<item>` in document order.
    pub fn items(&self) -> Vec<XmlItem<'_>> {
        let mut found = Vec::new();
        if self.root.name == "item" {
            found.push(&self.root);
        }
        self.root.find_all("item", &mut found);
        found.into_iter().map(XmlItem).collect()
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        // Only the first top-level element is the document root
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

/// Channel-level values items fall back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    /// `channel > image > url`, then the channel's own `itunes:image@href`.
    pub image_url: Option<String>,
}

impl ChannelInfo {
    /// Reads the channel fallbacks; a document without `<channel>` has none.
    pub fn from_document(doc: &XmlDocument) -> Self {
        let Some(channel) = doc.channel() else {
            return Self::default();
        };

        let classic = channel
            .child("image")
            .and_then(|image| image.child("url"))
            .map(|url| url.text_content().trim().to_string())
            .filter(|s| !s.is_empty());

        let itunes = || {
            channel
                .child("itunes:image")
                .and_then(|image| image.attribute("href"))
                .map(|href| href.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Self {
            image_url: classic.or_else(itunes),
        }
    }
}

/// One `<item>` element of a feed document.
#[derive(Debug, Clone, Copy)]
pub struct XmlItem<'a>(pub &'a XmlElement);

impl NormalizeItem for XmlItem<'_> {
    type Context = ChannelInfo;

    fn normalize(&self, channel: &ChannelInfo, defaults: &EpisodeDefaults) -> Episode {
        let item = self.0;

        let title = clean_inline(&item.value_of("title"));

        let audio_url = item
            .find("enclosure")
            .and_then(|e| e.attribute("url"))
            .map(|u| u.trim().to_string())
            .unwrap_or_default();

        let author = first_non_empty([item.value_of("itunes:author"), item.value_of("author")])
            .map(|a| clean_inline(&a))
            .unwrap_or_else(|| defaults.brand.clone());

        let description = first_non_empty([
            item.value_of("description"),
            item.value_of("itunes:summary"),
        ])
        .map(|d| sanitize_description(&d))
        .unwrap_or_default();

        let image_url = item
            .find("itunes:image")
            .and_then(|e| e.attribute("href"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| channel.image_url.clone())
            .unwrap_or_else(|| defaults.placeholder_image_url.clone());

        let category = item
            .find("itunes:category")
            .map(category_label)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| defaults.default_category.clone());

        let raw_duration = item.value_of("itunes:duration");

        Episode {
            id: episode_id(Some(&item.value_of("guid")), &title, &audio_url),
            title,
            author,
            description,
            duration: format_duration(Some(raw_duration.trim())),
            image_url,
            audio_url,
            category,
        }
    }
}

/// `itunes:category` carries its label as a `text` attribute; plain feeds use text content.
fn category_label(element: &XmlElement) -> String {
    match element.attribute("text") {
        Some(text) if !text.trim().is_empty() => clean_inline(text),
        _ => clean_inline(&element.text_content()),
    }
}

fn first_non_empty<const N: usize>(candidates: [String; N]) -> Option<String> {
    candidates.into_iter().find(|c| !c.trim().is_empty())
}

/// Returns the upstream GUID, or a stable SHA-256 of `title|audio_url` when absent.
///
/// The hash keeps ids identical across repeated fetches of the same feed.
pub fn episode_id(guid: Option<&str>, title: &str, audio_url: &str) -> String {
    if let Some(guid) = guid {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!("{}|{}", title, audio_url);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::feed::normalize::playable;
    use proptest::prelude::*;

    fn duration_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            (0u32..100_000).prop_map(|s| s.to_string()),
            (0u32..10, 0u32..60, 0u32..60).prop_map(|(h, m, s)| format!("{h:02}:{m:02}:{s:02}")),
            (0u32..120, 0u32..60).prop_map(|(m, s)| format!("{m}:{s:02}")),
            "[a-z ]{1,8}",
        ]
    }

    prop_compose! {
        fn item_xml()(
            title in "[A-Za-z0-9 ]{0,40}",
            guid in proptest::option::of("[a-z0-9-]{0,12}"),
            description in "[A-Za-z0-9 ,.]{0,300}",
            duration in duration_strategy(),
            enclosure in proptest::option::of("[a-z0-9]{1,10}"),
        ) -> (String, bool) {
            let mut xml = format!("<item><title>{title}</title>");
            if let Some(guid) = guid {
                xml.push_str(&format!("<guid>{guid}</guid>"));
            }
            xml.push_str(&format!(
                "<description><![CDATA[<p>{description}</p><br/>]]></description>\
                 <itunes:duration>{duration}</itunes:duration>"
            ));
            let has_enclosure = enclosure.is_some();
            if let Some(name) = enclosure {
                xml.push_str(&format!("<enclosure url=\"https://cdn.example.com/{name}.mp3\"/>"));
            }
            xml.push_str("</item>");
            (xml, has_enclosure)
        }
    }

    proptest! {
        #[test]
        fn normalizing_twice_is_identical(generated in proptest::collection::vec(item_xml(), 0..6)) {
            let body: String = generated.iter().map(|(xml, _)| xml.as_str()).collect();
            let feed = format!("<rss><channel>{body}</channel></rss>");
            let doc = XmlDocument::parse(&feed).unwrap();
            let channel = ChannelInfo::from_document(&doc);
            let defaults = EpisodeDefaults::default();

            let items = doc.items();
            let first = playable(&items, &channel, &defaults);
            let second = playable(&items, &channel, &defaults);
            prop_assert_eq!(&first, &second);

            let expected = generated.iter().filter(|(_, has_enclosure)| *has_enclosure).count();
            prop_assert_eq!(first.len(), expected);
            prop_assert!(first.iter().all(|ep| ep.is_playable()));
            prop_assert!(first.iter().all(|ep| ep.description.chars().count() <= 253));
        }
    }
}
