use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::config::Config;
use crate::episode::{Episode, EpisodeDefaults};
use crate::feed::cancel::CancelToken;
use crate::feed::degrade::Degradation;
use crate::feed::strategy::{Strategy, StrategyError, StrategyKind};

const USER_AGENT: &str = concat!("podfeed/", env!("CARGO_PKG_VERSION"));

static LAST_CACHE_BUST: AtomicU64 = AtomicU64::new(0);

/// Returns a cache-bust token: wall-clock milliseconds, strictly increasing per process.
fn next_cache_bust_token() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut last = LAST_CACHE_BUST.load(Ordering::Acquire);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_CACHE_BUST.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// How one pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// A strategy produced at least one playable episode.
    Success {
        strategy: StrategyKind,
        episodes: Vec<Episode>,
    },
    /// Every strategy failed; `episodes` is the degradation output.
    Exhausted { episodes: Vec<Episode> },
    /// The caller cancelled; `episodes` is the degradation output.
    Cancelled { episodes: Vec<Episode> },
}

impl Acquisition {
    /// Episodes of any terminal state.
    pub fn into_episodes(self) -> Vec<Episode> {
        match self {
            Acquisition::Success { episodes, .. }
            | Acquisition::Exhausted { episodes }
            | Acquisition::Cancelled { episodes } => episodes,
        }
    }
}

/// Retrieves a podcast's episode list through an ordered fallback chain.
///
/// Strategies run strictly one after another; the first one yielding a
/// playable episode wins and later ones never touch the network. Failures are
/// logged and never returned: the caller always gets a list, possibly the
/// degradation output.
///
/// # Example
///
/// ```ignore
/// let pipeline = FeedPipeline::new(&Config::default())?;
/// let episodes = pipeline.fetch_episodes().await;
/// ```
#[derive(Debug, Clone)]
pub struct FeedPipeline {
    client: reqwest::Client,
    feed_url: String,
    strategies: Vec<Strategy>,
    timeout: Duration,
    defaults: EpisodeDefaults,
    degradation: Degradation,
}

impl FeedPipeline {
    /// Builds a pipeline with its own HTTP client.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Builds a pipeline around a caller-configured client.
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            feed_url: config.feed_url.clone(),
            strategies: config.strategy_chain(),
            timeout: config.request_timeout(),
            defaults: config.episode_defaults(),
            degradation: config.degradation(),
        }
    }

    /// Replaces the exhaustion outcome.
    pub fn with_degradation(mut self, degradation: Degradation) -> Self {
        self.degradation = degradation;
        self
    }

    /// The strategies this pipeline tries, in order.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Runs the chain once and returns the episodes, newest first as upstream orders them.
    pub async fn fetch_episodes(&self) -> Vec<Episode> {
        self.acquire(&CancelToken::new()).await.into_episodes()
    }

    /// Like [`fetch_episodes`](Self::fetch_episodes), but stops as soon as `cancel` fires.
    ///
    /// A cancelled run resolves through the degradation policy.
    pub async fn fetch_episodes_with_cancel(&self, cancel: &CancelToken) -> Vec<Episode> {
        self.acquire(cancel).await.into_episodes()
    }

    /// Runs the chain and reports which terminal state it reached.
    pub async fn acquire(&self, cancel: &CancelToken) -> Acquisition {
        let token = next_cache_bust_token();

        for (index, strategy) in self.strategies.iter().enumerate() {
            let kind = strategy.kind();
            if cancel.is_cancelled() {
                break;
            }

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StrategyError::Cancelled),
                result = self.attempt(strategy, token) => result,
            };

            match attempt {
                Ok(episodes) => {
                    tracing::info!(
                        strategy = %kind,
                        attempt = index + 1,
                        episodes = episodes.len(),
                        "Episodes fetched"
                    );
                    return Acquisition::Success {
                        strategy: kind,
                        episodes,
                    };
                }
                Err(StrategyError::Cancelled) => break,
                Err(e) => {
                    tracing::warn!(
                        strategy = %kind,
                        attempt = index + 1,
                        failure = ?e.failure_kind(),
                        error = %e,
                        "Strategy failed, falling back"
                    );
                }
            }
        }

        let episodes = self.degradation.resolve();
        if cancel.is_cancelled() {
            tracing::info!(episodes = episodes.len(), "Feed fetch cancelled");
            Acquisition::Cancelled { episodes }
        } else {
            tracing::warn!(
                strategies = self.strategies.len(),
                episodes = episodes.len(),
                "All fetch strategies failed"
            );
            Acquisition::Exhausted { episodes }
        }
    }

    async fn attempt(&self, strategy: &Strategy, token: u64) -> Result<Vec<Episode>, StrategyError> {
        let raw = strategy
            .fetch(&self.client, &self.feed_url, token, self.timeout)
            .await?;
        let episodes = raw.playable_episodes(&self.defaults);
        if episodes.is_empty() {
            return Err(StrategyError::NoPlayableItems {
                items: raw.item_count(),
            });
        }
        Ok(episodes)
    }
}
