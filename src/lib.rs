//! Podcast episode feed acquisition.
//!
//! Fetches a show's syndication feed through a fallback chain of sources,
//! normalizes markup and JSON items into one [`Episode`] record and always
//! returns a list, falling back to a configured result when every source fails.

pub mod config;
pub mod episode;
pub mod feed;
pub mod util;

pub use config::{Config, ConfigError};
pub use episode::{Episode, EpisodeDefaults};
pub use feed::{CancelToken, Degradation, ExhaustionPolicy, FeedPipeline};
