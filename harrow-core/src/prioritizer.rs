//! Feedback-driven payload prioritization.
//!
//! After each task the dispatcher reports whether the payload "hit": it produced a
//! finding, or the coverage source reported identifiers not seen before. Scores
//! decay on every observation and grow on hits; the highest-scoring payloads are
//! replayed against every target once the main pass is done. [`NoFeedback`]
//! disables all of this and leaves the dispatch order untouched.

use crate::payloads::Category;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

pub const DECAY: f64 = 0.9;
pub const HIT_REWARD: f64 = 100.0;
/// Scores below this are not worth a replay.
const MIN_REPLAY_SCORE: f64 = 1.0;

/// Reports the identifiers (paths, blocks, lines) the target has executed so far.
#[async_trait]
pub trait CoverageSource: Send + Sync {
    async fn covered(&self) -> Vec<String>;
}

/// Polls an HTTP endpoint returning a JSON array of coverage identifiers.
pub struct HttpCoverage {
    client: Client,
    endpoint: Url,
}

impl HttpCoverage {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl CoverageSource for HttpCoverage {
    async fn covered(&self) -> Vec<String> {
        let response = match self.client.get(self.endpoint.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Coverage endpoint {} unreachable: {}", self.endpoint, e);
                return Vec::new();
            }
        };
        match response.json::<Vec<String>>().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Coverage endpoint returned an unexpected body: {}", e);
                Vec::new()
            }
        }
    }
}

/// Set of coverage identifiers seen so far.
#[derive(Debug, Default)]
pub struct CoverageTracker {
    seen: HashSet<String>,
}

impl CoverageTracker {
    /// Returns how many of `ids` were new.
    pub fn ingest(&mut self, ids: impl IntoIterator<Item = String>) -> usize {
        ids.into_iter().filter(|id| self.seen.insert(id.clone())).count()
    }

    /// Running maximum of distinct identifiers; never decreases.
    pub fn max_coverage(&self) -> usize {
        self.seen.len()
    }
}

#[async_trait]
pub trait FeedbackStrategy: Send + Sync {
    /// Called once per completed task, after its classification.
    async fn observe(&self, category: Category, payload: &str, detected: bool);

    /// Up to `n` payloads to replay, best first.
    async fn priority_payloads(&self, n: usize) -> Vec<(Category, String)>;
}

pub struct NoFeedback;

#[async_trait]
impl FeedbackStrategy for NoFeedback {
    async fn observe(&self, _category: Category, _payload: &str, _detected: bool) {}

    async fn priority_payloads(&self, _n: usize) -> Vec<(Category, String)> {
        Vec::new()
    }
}

#[derive(Default)]
struct PrioritizerState {
    scores: HashMap<(Category, String), f64>,
    coverage: CoverageTracker,
}

/// Scores payloads on detections and, when a coverage source is attached, on new coverage.
///
/// Tasks run concurrently, so new coverage is credited to whichever task polls first
/// after it appears.
pub struct AdaptivePrioritizer {
    coverage: Option<Box<dyn CoverageSource>>,
    state: Mutex<PrioritizerState>,
}

impl AdaptivePrioritizer {
    pub fn new() -> Self {
        Self {
            coverage: None,
            state: Mutex::new(PrioritizerState::default()),
        }
    }

    pub fn with_coverage(mut self, source: Box<dyn CoverageSource>) -> Self {
        self.coverage = Some(source);
        self
    }

    pub async fn score(&self, category: Category, payload: &str) -> f64 {
        let state = self.state.lock().await;
        state
            .scores
            .get(&(category, payload.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub async fn max_coverage(&self) -> usize {
        self.state.lock().await.coverage.max_coverage()
    }
}

impl Default for AdaptivePrioritizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackStrategy for AdaptivePrioritizer {
    async fn observe(&self, category: Category, payload: &str, detected: bool) {
        let ids = match &self.coverage {
            Some(source) => source.covered().await,
            None => Vec::new(),
        };

        let mut state = self.state.lock().await;
        let new_ids = state.coverage.ingest(ids);
        let hit = detected || new_ids > 0;

        let score = state
            .scores
            .entry((category, payload.to_string()))
            .or_insert(0.0);
        *score = *score * DECAY + if hit { HIT_REWARD } else { 0.0 };

        if new_ids > 0 {
            debug!(
                "{} new coverage ids after {} payload {:?} (max {})",
                new_ids,
                category,
                payload,
                state.coverage.max_coverage()
            );
        }
    }

    async fn priority_payloads(&self, n: usize) -> Vec<(Category, String)> {
        let state = self.state.lock().await;
        let mut ranked: Vec<(&(Category, String), &f64)> = state
            .scores
            .iter()
            .filter(|(_, score)| **score >= MIN_REPLAY_SCORE)
            .collect();
        ranked.sort_by(|(ka, sa), (kb, sb)| sb.total_cmp(*sa).then_with(|| ka.cmp(kb)));
        ranked.into_iter().take(n).map(|(k, _)| k.clone()).collect()
    }
}
