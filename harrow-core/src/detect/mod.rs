//! Response classification: one detector per payload category.
//!
//! Detectors are pure functions of a [`Probe`]: the fuzz response, the payload that
//! produced it, the form's baseline (if one could be established), and the run's
//! thresholds. The first rule that fires inside a detector wins; a detector that
//! fires nothing means "No Finding".

pub mod command;
pub mod csrf;
pub mod differential;
pub mod redirect;
pub mod sqli;
pub mod ssti;
pub mod traversal;
pub mod xss;

use crate::baseline::Baseline;
use crate::config::DetectionConfig;
use crate::payloads::Category;
use crate::request::ResponseSnapshot;
use std::cell::OnceCell;
use std::time::Duration;
use url::Url;

/// A detector's verdict before timing and evidence are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub label: &'static str,
    pub base_confidence: u8,
}

impl Detection {
    pub const fn new(label: &'static str, base_confidence: u8) -> Self {
        Self {
            label,
            base_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub label: String,
    pub confidence: u8,
    pub evidence: String,
}

/// Everything a detector may consult for a single response.
pub struct Probe<'a> {
    pub response: &'a ResponseSnapshot,
    pub payload: &'a str,
    pub baseline: Option<&'a Baseline>,
    pub origin: &'a Url,
    pub config: &'a DetectionConfig,
    drift: OnceCell<bool>,
}

impl<'a> Probe<'a> {
    pub fn new(
        response: &'a ResponseSnapshot,
        payload: &'a str,
        baseline: Option<&'a Baseline>,
        origin: &'a Url,
        config: &'a DetectionConfig,
    ) -> Self {
        Self {
            response,
            payload,
            baseline,
            origin,
            config,
            drift: OnceCell::new(),
        }
    }

    pub fn body(&self) -> &str {
        &self.response.body
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Body differs from the baseline beyond the similarity threshold. False without a baseline.
    pub fn content_drift(&self) -> bool {
        *self.drift.get_or_init(|| {
            self.baseline.is_some_and(|b| {
                differential::content_differs(
                    &b.body,
                    &self.response.body,
                    self.config.similarity_threshold,
                    self.config.max_compare_chars,
                )
            })
        })
    }

    pub fn status_changed(&self) -> bool {
        self.baseline.is_some_and(|b| b.status != self.response.status)
    }

    /// Extra time this response took over the baseline (over zero when there is none).
    pub fn extra_delay(&self) -> Duration {
        let reference = self.baseline.map(|b| b.elapsed).unwrap_or_default();
        self.response.elapsed.saturating_sub(reference)
    }

    pub fn baseline_contains(&self, needle: &str) -> bool {
        self.baseline.is_some_and(|b| b.body.contains(needle))
    }
}

impl Category {
    pub fn detect(&self, probe: &Probe) -> Option<Detection> {
        match self {
            Category::SqlInjection => sqli::detect(probe),
            Category::Xss => xss::detect(probe),
            Category::CommandInjection => command::detect(probe),
            Category::PathTraversal => traversal::detect(probe),
            Category::Ssti => ssti::detect(probe),
            Category::OpenRedirect => redirect::detect(probe),
            Category::Csrf => csrf::detect(probe),
        }
    }
}

/// Applies the category's detector and scores the result.
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    config: DetectionConfig,
    origin: Url,
}

impl DetectionEngine {
    pub fn new(config: DetectionConfig, origin: Url) -> Self {
        Self { config, origin }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        category: Category,
        payload: &str,
        response: &ResponseSnapshot,
        baseline: Option<&Baseline>,
    ) -> Option<Finding> {
        let probe = Probe::new(response, payload, baseline, &self.origin, &self.config);
        let detection = category.detect(&probe)?;

        Some(Finding {
            label: detection.label.to_string(),
            confidence: confidence(detection.base_confidence, response.elapsed),
            evidence: evidence_snippet(&response.body, payload, self.config.evidence_width),
        })
    }
}

/// Scales a base confidence by up to 50% for slow responses (capped at 5s), never above 100.
pub fn confidence(base: u8, elapsed: Duration) -> u8 {
    let secs = elapsed.as_secs_f64().min(5.0);
    let scaled = f64::from(base) * (1.0 + secs / 10.0);
    scaled.round().min(100.0) as u8
}

/// Up to `width` characters of `body` centered on the payload's first occurrence,
/// or the start of the body when the payload is not reflected.
pub fn evidence_snippet(body: &str, payload: &str, width: usize) -> String {
    let total = body.chars().count();
    let start = match (payload.is_empty(), body.find(payload)) {
        (false, Some(byte_idx)) => {
            let char_idx = body[..byte_idx].chars().count();
            let center = char_idx + payload.chars().count() / 2;
            center
                .saturating_sub(width / 2)
                .min(total.saturating_sub(width))
        }
        _ => 0,
    };
    body.chars().skip(start).take(width).collect()
}
