//! Configuration file parser for ~/.config/podfeed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::episode::{Episode, EpisodeDefaults, DEFAULT_BRAND, DEFAULT_CATEGORY, PLACEHOLDER_IMAGE_URL};
use crate::feed::{Degradation, ExhaustionPolicy, Strategy, StrategyKind};
use crate::util::validate_endpoint;

/// Environment variable that overrides `feed_url`.
pub const FEED_URL_ENV: &str = "PODFEED_FEED_URL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The podcast's syndication feed.
    pub feed_url: String,

    /// Relay prefix; the percent-encoded feed URL is appended verbatim.
    pub relay_url: String,

    /// Feed-to-JSON conversion endpoint.
    pub converter_url: String,

    /// Item-count hint passed to the converter.
    pub converter_item_count: u32,

    /// Deadline for each strategy attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Strategies to try, in order.
    pub strategies: Vec<StrategyKind>,

    /// Author used when the feed names none.
    pub brand: String,

    pub placeholder_image_url: String,

    pub default_category: String,

    /// What to return when every strategy fails.
    pub on_exhaustion: ExhaustionPolicy,

    /// Offline episodes returned under `on_exhaustion = "fallback"`.
    pub fallback_episodes: Vec<Episode>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://anchor.fm/s/103ba4880/podcast/rss".to_string(),
            relay_url: "https://corsproxy.io/?".to_string(),
            converter_url: "https://api.rss2json.com/v1/api.json".to_string(),
            converter_item_count: 50,
            request_timeout_secs: 15,
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            brand: DEFAULT_BRAND.to_string(),
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
            on_exhaustion: ExhaustionPolicy::Empty,
            fallback_episodes: Vec::new(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "feed_url",
        "relay_url",
        "converter_url",
        "converter_item_count",
        "request_timeout_secs",
        "strategies",
        "brand",
        "placeholder_image_url",
        "default_category",
        "on_exhaustion",
        "fallback_episodes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - Bad endpoint URLs or a zero timeout → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            feed_url = %config.feed_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `feed_url` with a non-empty override (environment or CLI).
    pub fn with_feed_url_override(mut self, value: Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!(feed_url = %url, "Overriding feed URL");
            self.feed_url = url;
            self.validate()?;
        }
        Ok(self)
    }

    /// Checks endpoint URLs for the enabled strategies and numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = |key: &'static str, value: &str| {
            validate_endpoint(value)
                .map(|_| ())
                .map_err(|e| ConfigError::Invalid {
                    key,
                    reason: format!("{value:?}: {e}"),
                })
        };

        endpoint("feed_url", &self.feed_url)?;
        if self.strategies.contains(&StrategyKind::Relay) {
            endpoint("relay_url", &self.relay_url)?;
        }
        if self.strategies.contains(&StrategyKind::Converter) {
            endpoint("converter_url", &self.converter_url)?;
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.converter_item_count == 0 {
            return Err(ConfigError::Invalid {
                key: "converter_item_count",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Per-attempt deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured strategies in order, each listed once.
    pub fn strategy_chain(&self) -> Vec<Strategy> {
        let mut seen = Vec::new();
        self.strategies
            .iter()
            .filter(|kind| {
                if seen.contains(*kind) {
                    tracing::warn!(strategy = %kind, "Strategy listed twice, ignoring repeat");
                    false
                } else {
                    seen.push(**kind);
                    true
                }
            })
            .map(|kind| match kind {
                StrategyKind::Direct => Strategy::Direct,
                StrategyKind::Relay => Strategy::Relay {
                    prefix: self.relay_url.clone(),
                },
                StrategyKind::Converter => Strategy::Converter {
                    endpoint: self.converter_url.clone(),
                    item_count: self.converter_item_count,
                },
            })
            .collect()
    }

    /// Values normalizers substitute for missing item fields.
    pub fn episode_defaults(&self) -> EpisodeDefaults {
        EpisodeDefaults {
            brand: self.brand.clone(),
            placeholder_image_url: self.placeholder_image_url.clone(),
            default_category: self.default_category.clone(),
        }
    }

    pub fn degradation(&self) -> Degradation {
        Degradation::from_policy(self.on_exhaustion, &self.fallback_episodes)
    }
}

// ============================================================================
// Tests
// ============================================================================
