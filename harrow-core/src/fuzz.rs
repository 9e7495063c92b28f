//! Concurrent payload dispatch against discovered forms.

use crate::baseline::BaselineOracle;
use crate::config::ScanConfig;
use crate::data::{Aggregator, Attempt, AttemptResult, FuzzOutcome, Vulnerability};
use crate::detect::DetectionEngine;
use crate::error::Result;
use crate::payloads::{Category, PayloadCatalog};
use crate::prioritizer::FeedbackStrategy;
use crate::request::{action_url, execute, form_request, payload_params};
use futures::future::join_all;
use harrow_scanner::Form;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Options for configuring a fuzz run
#[derive(Debug, Clone)]
pub struct FuzzOptions {
    pub concurrency: usize,
    /// Pause after every request, holding the worker slot.
    pub request_delay: Duration,
    pub show_progress_bars: bool,
    /// How many top-scoring payloads to replay after the main pass.
    pub priority_replay: usize,
}

impl Default for FuzzOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            request_delay: Duration::from_millis(200),
            show_progress_bars: false,
            priority_replay: 5,
        }
    }
}

impl From<&ScanConfig> for FuzzOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            request_delay: config.request_delay(),
            show_progress_bars: config.show_progress_bars,
            priority_replay: config.priority_replay,
        }
    }
}

/// Client for the fuzzing session: keeps cookies, never follows redirects.
pub fn session_client(config: &ScanConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs((config.request_timeout_secs / 2).max(1)))
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(harrow_scanner::ScanError::from)?;
    Ok(client)
}

#[derive(Debug, Clone)]
struct FuzzTask {
    form: Arc<Form>,
    category: Category,
    payload: Arc<str>,
}

struct Shared {
    client: Client,
    oracle: BaselineOracle,
    engine: DetectionEngine,
    feedback: Arc<dyn FeedbackStrategy>,
    aggregator: Aggregator,
    request_delay: Duration,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    options: FuzzOptions,
}

impl Dispatcher {
    pub fn new(
        client: Client,
        engine: DetectionEngine,
        feedback: Arc<dyn FeedbackStrategy>,
        options: FuzzOptions,
    ) -> Self {
        let shared = Shared {
            oracle: BaselineOracle::new(client.clone()),
            client,
            engine,
            feedback,
            aggregator: Aggregator::new(),
            request_delay: options.request_delay,
        };
        Self {
            shared: Arc::new(shared),
            options,
        }
    }

    /// Runs every payload against every form, then replays the prioritized payloads.
    /// Each task leaves exactly one attempt behind.
    pub async fn run(&self, forms: &[Form], catalog: &PayloadCatalog) -> FuzzOutcome {
        let forms: Vec<Arc<Form>> = forms.iter().cloned().map(Arc::new).collect();
        if forms.is_empty() {
            info!("No fuzz targets discovered");
            return self.shared.aggregator.snapshot().await;
        }

        let tasks = build_tasks(
            &forms,
            catalog
                .iter()
                .map(|(category, payload)| (category, payload.clone())),
        );
        info!(
            "Fuzzing {} forms with {} payloads ({} tasks, {} workers)",
            forms.len(),
            catalog.total(),
            tasks.len(),
            self.options.concurrency
        );
        self.dispatch(tasks, "fuzz").await;

        let replay = self
            .shared
            .feedback
            .priority_payloads(self.options.priority_replay)
            .await;
        if !replay.is_empty() {
            info!("Replaying {} prioritized payloads", replay.len());
            let tasks = build_tasks(&forms, replay);
            self.dispatch(tasks, "replay").await;
        }

        let outcome = self.shared.aggregator.snapshot().await;
        info!(
            "Fuzzing complete: {} attempts, {} vulnerabilities",
            outcome.attempts.len(),
            outcome.vulnerabilities.len()
        );
        outcome
    }

    async fn dispatch(&self, tasks: Vec<FuzzTask>, phase: &str) {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));

        let pb = if self.options.show_progress_bars {
            let progress_bar = ProgressBar::new(tasks.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                progress_bar.set_style(style.progress_chars("=>-"));
            }
            progress_bar.set_message(phase.to_string());
            Some(progress_bar)
        } else {
            None
        };

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let shared = self.shared.clone();
            let semaphore = semaphore.clone();
            let pb = pb.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let (attempt, vulnerability) = shared.execute(&task).await;
                shared
                    .feedback
                    .observe(task.category, &task.payload, vulnerability.is_some())
                    .await;
                shared.aggregator.record(attempt, vulnerability).await;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                tokio::time::sleep(shared.request_delay).await;
            }));
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Fuzz task failed: {}", e);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message(format!("{}: done", phase));
        }
    }
}

fn build_tasks(
    forms: &[Arc<Form>],
    payloads: impl IntoIterator<Item = (Category, String)>,
) -> Vec<FuzzTask> {
    let payloads: Vec<(Category, Arc<str>)> = payloads
        .into_iter()
        .map(|(category, payload)| (category, Arc::from(payload)))
        .collect();

    forms
        .iter()
        .flat_map(|form| {
            payloads.iter().map(move |(category, payload)| FuzzTask {
                form: form.clone(),
                category: *category,
                payload: payload.clone(),
            })
        })
        .collect()
}

impl Shared {
    async fn execute(&self, task: &FuzzTask) -> (Attempt, Option<Vulnerability>) {
        let form = task.form.as_ref();
        let mut attempt = Attempt {
            form_action: form.action.clone(),
            method: form.method,
            category: task.category,
            payload: task.payload.to_string(),
            result: AttemptResult::Failed,
            status: None,
            elapsed_ms: 0,
            error: None,
        };

        let Some(url) = action_url(form) else {
            attempt.error = Some(format!("invalid form action '{}'", form.action));
            return (attempt, None);
        };

        let baseline = self.oracle.get_or_establish(form).await;
        let params = payload_params(form, &task.payload);
        let request = form_request(&self.client, url, form.method, &params);

        let start = Instant::now();
        let snapshot = match execute(request).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                attempt.elapsed_ms = start.elapsed().as_millis() as u64;
                attempt.result = if e.is_timeout() {
                    AttemptResult::Timeout
                } else {
                    AttemptResult::Failed
                };
                debug!(
                    "{} {} with {:?}: {}",
                    form.method.as_str(),
                    form.action,
                    task.payload,
                    e
                );
                attempt.error = Some(e.to_string());
                return (attempt, None);
            }
        };

        attempt.status = Some(snapshot.status);
        attempt.elapsed_ms = snapshot.elapsed.as_millis() as u64;

        let Some(finding) =
            self.engine
                .analyze(task.category, &task.payload, &snapshot, baseline.as_deref())
        else {
            attempt.result = AttemptResult::NoFinding;
            return (attempt, None);
        };

        info!(
            "{} on {} {} (confidence {})",
            finding.label,
            form.method.as_str(),
            form.action,
            finding.confidence
        );
        attempt.result = AttemptResult::Finding(finding.label.clone());
        let vulnerability = Vulnerability {
            vuln_type: finding.label,
            category: task.category,
            payload: task.payload.to_string(),
            form_action: form.action.clone(),
            method: form.method,
            confidence: finding.confidence,
            evidence: finding.evidence,
            response_code: snapshot.status,
        };
        (attempt, Some(vulnerability))
    }
}
