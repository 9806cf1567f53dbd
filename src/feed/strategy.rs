use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::json::ConverterResponse;
use crate::feed::normalize::RawFeed;
use crate::feed::xml::{looks_like_feed, XmlDocument};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Characters escaped when a URL is embedded as one component: everything but
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// The acquisition methods, in their default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fetch the feed URL itself. Freshest, but blocked in some environments.
    Direct,
    /// Fetch the same URL through a pass-through relay.
    Relay,
    /// Ask a hosted service to convert the feed to JSON. Most available, possibly stale.
    Converter,
}

impl StrategyKind {
    /// Freshest source first, most available last.
    pub const DEFAULT_ORDER: [StrategyKind; 3] =
        [StrategyKind::Direct, StrategyKind::Relay, StrategyKind::Converter];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Relay => "relay",
            StrategyKind::Converter => "converter",
        })
    }
}

/// Broad failure classes of a single strategy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    MalformedResponse,
    NoPlayableItems,
    Cancelled,
}

/// Errors that abandon one strategy attempt.
///
/// None of these reach the pipeline's caller: each is logged and the next
/// strategy runs.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the per-attempt deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Response is not valid UTF-8")]
    InvalidUtf8,
    /// Body received but not recognizable as the expected format
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// Parsed fine, but no item carries an audio URL
    #[error("No playable items ({items} items in response)")]
    NoPlayableItems { items: usize },
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Cancelled")]
    Cancelled,
}

impl StrategyError {
    /// Coarse category used in fallthrough logs.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StrategyError::Network(_)
            | StrategyError::Timeout(_)
            | StrategyError::HttpStatus(_)
            | StrategyError::InvalidEndpoint(_) => FailureKind::Network,
            StrategyError::ResponseTooLarge
            | StrategyError::InvalidUtf8
            | StrategyError::Malformed(_) => FailureKind::MalformedResponse,
            StrategyError::NoPlayableItems { .. } => FailureKind::NoPlayableItems,
            StrategyError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// A fully configured acquisition strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    /// `prefix` receives the percent-encoded target URL, e.g. `https://corsproxy.io/?`.
    Relay { prefix: String },
    /// `endpoint` is called with `rss_url` and `count` query parameters.
    Converter { endpoint: String, item_count: u32 },
}

impl Strategy {
    /// The configuration-level kind of this strategy.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Direct => StrategyKind::Direct,
            Strategy::Relay { .. } => StrategyKind::Relay,
            Strategy::Converter { .. } => StrategyKind::Converter,
        }
    }

    /// Builds the request URL for one attempt.
    ///
    /// Every URL carries the cache-bust `token` so intermediate caches cannot
    /// serve an old copy. The converter receives the feed URL without the
    /// token since it keys its own cache on the source URL; the token goes on
    /// the converter request itself.
    pub fn request_url(&self, feed_url: &str, token: u64) -> Result<Url, StrategyError> {
        let fresh = cache_busted(feed_url, token)?;
        match self {
            Strategy::Direct => Ok(fresh),
            Strategy::Relay { prefix } => {
                let encoded = utf8_percent_encode(fresh.as_str(), COMPONENT);
                Url::parse(&format!("{prefix}{encoded}"))
                    .map_err(|e| StrategyError::InvalidEndpoint(format!("{prefix}: {e}")))
            }
            Strategy::Converter {
                endpoint,
                item_count,
            } => {
                let mut url = Url::parse(endpoint)
                    .map_err(|e| StrategyError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
                url.query_pairs_mut()
                    .append_pair("rss_url", feed_url)
                    .append_pair("count", &item_count.to_string())
                    .append_pair("t", &token.to_string());
                Ok(url)
            }
        }
    }

    /// Runs one attempt: fetch, validate the response shape, parse.
    ///
    /// Zero-item results are returned as-is; deciding whether the items are
    /// playable is the pipeline's job.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `feed_url` - The podcast's feed URL, before cache-busting
    /// * `token` - Cache-bust token shared by every attempt of one run
    /// * `timeout` - Deadline for the request and body read together
    ///
    /// # Errors
    ///
    /// Returns a [`StrategyError`] for transport failures, non-2xx statuses,
    /// oversized bodies and responses that are not the expected shape.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        feed_url: &str,
        token: u64,
        timeout: Duration,
    ) -> Result<RawFeed, StrategyError> {
        let url = self.request_url(feed_url, token)?;
        tracing::debug!(strategy = %self.kind(), url = %url, "Requesting feed");

        let body = tokio::time::timeout(timeout, fetch_body(client, url))
            .await
            .map_err(|_| StrategyError::Timeout(timeout))??;

        match self {
            Strategy::Direct | Strategy::Relay { .. } => parse_markup(&body),
            Strategy::Converter { .. } => parse_structured(&body),
        }
    }
}

/// Appends `t=<token>` to the feed URL.
fn cache_busted(feed_url: &str, token: u64) -> Result<Url, StrategyError> {
    let mut url = Url::parse(feed_url)
        .map_err(|e| StrategyError::InvalidEndpoint(format!("{feed_url}: {e}")))?;
    url.query_pairs_mut().append_pair("t", &token.to_string());
    Ok(url)
}

async fn fetch_body(client: &reqwest::Client, url: Url) -> Result<String, StrategyError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(StrategyError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    String::from_utf8(bytes).map_err(|_| StrategyError::InvalidUtf8)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, StrategyError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(StrategyError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(StrategyError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

fn parse_markup(body: &str) -> Result<RawFeed, StrategyError> {
    if !looks_like_feed(body) {
        return Err(StrategyError::Malformed("no feed markup in response".into()));
    }
    XmlDocument::parse(body)
        .map(RawFeed::Markup)
        .map_err(|e| StrategyError::Malformed(e.to_string()))
}

fn parse_structured(body: &str) -> Result<RawFeed, StrategyError> {
    let response: ConverterResponse =
        serde_json::from_str(body).map_err(|e| StrategyError::Malformed(e.to_string()))?;
    if !response.is_ok() {
        return Err(StrategyError::Malformed(format!(
            "converter status {:?}",
            response.status
        )));
    }
    Ok(RawFeed::Structured(response))
}
