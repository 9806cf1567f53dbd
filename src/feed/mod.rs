//! Episode feed acquisition.
//!
//! The pipeline retrieves a podcast's episode list through an ordered chain
//! of unreliable sources and converges every response shape on [`Episode`]:
//!
//! - **Strategies**: direct fetch, pass-through relay, hosted JSON converter
//! - **Normalizers**: feed markup items and converter JSON items, both
//!   implementing [`NormalizeItem`]
//! - **Degradation**: the configured outcome when every strategy fails
//!
//! # Architecture
//!
//! - [`strategy`] - request building, bounded HTTP fetch, response validation
//! - [`xml`] - quick-xml element tree and the markup normalizer
//! - [`json`] - lenient serde model of the converter response
//! - [`normalize`] - the shared item capability and the [`RawFeed`] sum type
//! - [`degrade`] - exhaustion policy
//! - [`pipeline`] - sequential orchestration with per-attempt deadlines
//!
//! # Example
//!
//! ```ignore
//! use podfeed::{Config, FeedPipeline};
//!
//! let pipeline = FeedPipeline::new(&Config::default())?;
//! for episode in pipeline.fetch_episodes().await {
//!     println!("{} ({})", episode.title, episode.duration);
//! }
//! ```
//!
//! [`Episode`]: crate::episode::Episode

pub mod cancel;
pub mod degrade;
pub mod json;
pub mod normalize;
pub mod pipeline;
pub mod strategy;
pub mod xml;

pub use cancel::CancelToken;
pub use degrade::{Degradation, ExhaustionPolicy};
pub use json::{ConverterResponse, JsonItem};
pub use normalize::{NormalizeItem, RawFeed};
pub use pipeline::{Acquisition, FeedPipeline};
pub use strategy::{FailureKind, Strategy, StrategyError, StrategyKind};
pub use xml::{XmlDocument, XmlItem};
