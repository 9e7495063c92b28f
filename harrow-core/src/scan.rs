//! Run orchestration: robots, static crawl, dynamic crawl, login, fuzzing.

use crate::auth::login;
use crate::config::ScanConfig;
use crate::data::{Attempt, FuzzOutcome, Vulnerability};
use crate::detect::DetectionEngine;
use crate::error::{HarrowError, Result};
use crate::fuzz::{Dispatcher, FuzzOptions, session_client};
use crate::payloads::PayloadCatalog;
use crate::prioritizer::{AdaptivePrioritizer, FeedbackStrategy, HttpCoverage, NoFeedback};
use chrono::{DateTime, Utc};
use harrow_scanner::crawler::{ProgressCallback, crawl_client, render_client};
use harrow_scanner::{
    Crawler, DynamicCrawler, ExtractionResult, Form, HttpRenderer, Renderer, RobotsPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Everything a run produced, ready for the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub crawled_urls: Vec<String>,
    pub extraction_results: Vec<ExtractionResult>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub attempts: Vec<Attempt>,
    /// Set when the login handshake failed and fuzzing never started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzing_aborted: Option<String>,
}

impl ScanReport {
    /// Vulnerability counts keyed by type.
    pub fn vulnerability_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.vulnerabilities {
            *counts.entry(v.vuln_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Attempt counts keyed by result label.
    pub fn attempt_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for a in &self.attempts {
            *counts.entry(a.result.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn form_count(&self) -> usize {
        self.extraction_results.iter().map(|r| r.forms.len()).sum()
    }
}

/// Output of both crawl phases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub crawled_urls: BTreeSet<String>,
    pub extraction_results: Vec<ExtractionResult>,
}

impl Discovery {
    /// Fuzzable forms across all pages, deduplicated by action, method and input names.
    pub fn fuzz_targets(&self) -> Vec<Form> {
        let mut seen = HashSet::new();
        self.extraction_results
            .iter()
            .flat_map(ExtractionResult::fuzz_targets)
            .filter(|form| seen.insert(form.target_key()))
            .collect()
    }
}

/// Per-run state. Independent runs share nothing, so they can execute concurrently.
pub struct ScanContext {
    run_id: Uuid,
    config: ScanConfig,
    origin: Url,
    catalog: PayloadCatalog,
    crawl_client: Client,
    session: Client,
    renderer: Arc<dyn Renderer>,
    feedback: Arc<dyn FeedbackStrategy>,
}

impl ScanContext {
    /// Validates the configuration and loads the catalog. No network activity.
    pub fn new(config: ScanConfig) -> Result<Self> {
        let origin = config.validate()?;
        let catalog = PayloadCatalog::load(config.payloads_path.as_deref())?
            .filtered(&config.categories)?;
        let crawl_client = crawl_client(&config.user_agent, config.request_timeout_secs)?;
        let session = session_client(&config)?;
        let render_client = render_client(&config.user_agent, config.request_timeout_secs)?;

        let feedback: Arc<dyn FeedbackStrategy> = match &config.coverage_endpoint {
            Some(endpoint) => {
                let endpoint = Url::parse(endpoint).map_err(|e| {
                    HarrowError::ConfigError(format!("Invalid coverage endpoint: {}", e))
                })?;
                Arc::new(
                    AdaptivePrioritizer::new()
                        .with_coverage(Box::new(HttpCoverage::new(crawl_client.clone(), endpoint))),
                )
            }
            None => Arc::new(NoFeedback),
        };

        Ok(Self {
            run_id: Uuid::new_v4(),
            renderer: Arc::new(HttpRenderer::new(render_client)),
            config,
            origin,
            catalog,
            crawl_client,
            session,
            feedback,
        })
    }

    /// Swap in another rendering backend, e.g. a browser driver.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackStrategy>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PayloadCatalog {
        &self.catalog
    }

    /// Static crawl, then a dynamic crawl from every statically found URL.
    pub async fn discover(&self) -> Discovery {
        let robots = RobotsPolicy::fetch(&self.crawl_client, &self.origin).await;
        let spinner = self.spinner("Crawling...");

        let mut crawler =
            Crawler::new(self.crawl_client.clone()).with_max_depth(self.config.max_depth);
        if let Some(ref pb) = spinner {
            crawler = crawler.with_progress_callback(spinner_callback(pb.clone()));
        }

        let static_urls = match crawler.crawl(&self.config.target, &robots).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!("Static crawl failed: {}", e);
                BTreeSet::new()
            }
        };
        info!("Static crawl found {} URLs", static_urls.len());

        if let Some(ref pb) = spinner {
            pb.set_message("Rendering pages...");
        }
        let dynamic = DynamicCrawler::new(self.renderer.clone(), self.config.render_timeout());
        let mut visited = HashSet::new();
        let mut extraction_results = Vec::new();
        for url in &static_urls {
            dynamic
                .crawl_dynamic(
                    url,
                    self.config.max_depth,
                    &mut visited,
                    &mut extraction_results,
                    &robots,
                )
                .await;
        }

        let mut crawled_urls = static_urls;
        crawled_urls.extend(extraction_results.iter().map(|r| r.url.clone()));

        if let Some(pb) = spinner {
            pb.finish_with_message(format!(
                "Crawl complete! {} URLs, {} pages extracted",
                crawled_urls.len(),
                extraction_results.len()
            ));
        }
        info!(
            "Dynamic crawl extracted {} pages ({} forms)",
            extraction_results.len(),
            extraction_results.iter().map(|r| r.forms.len()).sum::<usize>()
        );

        Discovery {
            crawled_urls,
            extraction_results,
        }
    }

    /// Login handshake, then dispatch. A failed login aborts fuzzing only.
    pub async fn exploit(&self, forms: &[Form]) -> Result<FuzzOutcome> {
        login(&self.session, &self.config.auth).await?;

        let engine = DetectionEngine::new(self.config.detection.clone(), self.origin.clone());
        let dispatcher = Dispatcher::new(
            self.session.clone(),
            engine,
            self.feedback.clone(),
            FuzzOptions::from(&self.config),
        );
        Ok(dispatcher.run(forms, &self.catalog).await)
    }

    pub async fn run(self) -> ScanReport {
        let started_at = Utc::now();
        info!("Run {} against {}", self.run_id, self.config.target);

        let discovery = self.discover().await;
        let targets = discovery.fuzz_targets();
        info!("{} distinct fuzz targets", targets.len());

        let (outcome, fuzzing_aborted) = match self.exploit(&targets).await {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                warn!("Fuzzing phase aborted: {}", e);
                (FuzzOutcome::default(), Some(e.to_string()))
            }
        };

        ScanReport {
            run_id: self.run_id,
            target: self.config.target.clone(),
            started_at,
            finished_at: Utc::now(),
            crawled_urls: discovery.crawled_urls.into_iter().collect(),
            extraction_results: discovery.extraction_results,
            vulnerabilities: outcome.vulnerabilities,
            attempts: outcome.attempts,
            fuzzing_aborted,
        }
    }

    fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.config.show_progress_bars {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        Some(pb)
    }
}

fn spinner_callback(pb: ProgressBar) -> ProgressCallback {
    let count = Arc::new(AtomicUsize::new(0));
    Arc::new(move |_depth: usize, _url: String| {
        let n = count.fetch_add(1, Ordering::Relaxed) + 1;
        pb.set_message(format!("Crawling... {} URLs processed", n));
        pb.tick();
    })
}
