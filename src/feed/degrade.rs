use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::episode::Episode;

/// What the pipeline returns once every strategy has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Return no episodes; the consumer shows its own empty state.
    #[default]
    Empty,
    /// Return the configured offline episode set.
    Fallback,
}

/// The resolved exhaustion outcome, injected into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Degradation {
    #[default]
    Empty,
    Fallback(Arc<[Episode]>),
}

impl Degradation {
    /// Builds a fallback set, dropping entries that could never be played.
    pub fn fallback(episodes: impl IntoIterator<Item = Episode>) -> Self {
        let playable: Vec<Episode> = episodes
            .into_iter()
            .filter(|ep| {
                let ok = ep.is_playable();
                if !ok {
                    tracing::warn!(id = %ep.id, "Fallback episode has no audio URL, dropping");
                }
                ok
            })
            .collect();
        Degradation::Fallback(playable.into())
    }

    /// Resolves a configured policy against the configured fallback set.
    pub fn from_policy(policy: ExhaustionPolicy, episodes: &[Episode]) -> Self {
        match policy {
            ExhaustionPolicy::Empty => Degradation::Empty,
            ExhaustionPolicy::Fallback => Degradation::fallback(episodes.iter().cloned()),
        }
    }

    /// The episodes to hand back after exhaustion. Identical on every call.
    pub fn resolve(&self) -> Vec<Episode> {
        match self {
            Degradation::Empty => Vec::new(),
            Degradation::Fallback(episodes) => episodes.to_vec(),
        }
    }
}
