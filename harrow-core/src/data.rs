use crate::payloads::Category;
use harrow_scanner::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Outcome of one (form, payload) task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AttemptResult {
    /// Carries the vulnerability label.
    Finding(String),
    NoFinding,
    Timeout,
    Failed,
}

impl AttemptResult {
    pub fn as_str(&self) -> &str {
        match self {
            AttemptResult::Finding(label) => label,
            AttemptResult::NoFinding => "No Finding",
            AttemptResult::Timeout => "Timeout",
            AttemptResult::Failed => "Request Failed",
        }
    }

    pub fn is_finding(&self) -> bool {
        matches!(self, AttemptResult::Finding(_))
    }
}

impl From<AttemptResult> for String {
    fn from(result: AttemptResult) -> Self {
        result.as_str().to_string()
    }
}

impl From<String> for AttemptResult {
    fn from(label: String) -> Self {
        match label.as_str() {
            "No Finding" => AttemptResult::NoFinding,
            "Timeout" => AttemptResult::Timeout,
            "Request Failed" => AttemptResult::Failed,
            _ => AttemptResult::Finding(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub form_action: String,
    pub method: Method,
    pub category: Category,
    pub payload: String,
    pub result: AttemptResult,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "type")]
    pub vuln_type: String,
    pub category: Category,
    pub payload: String,
    pub form_action: String,
    pub method: Method,
    pub confidence: u8,
    pub evidence: String,
    pub response_code: u16,
}

/// Everything the dispatcher produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzOutcome {
    pub vulnerabilities: Vec<Vulnerability>,
    pub attempts: Vec<Attempt>,
}

impl FuzzOutcome {
    /// Attempt counts keyed by result label.
    pub fn attempt_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for attempt in &self.attempts {
            *counts.entry(attempt.result.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Shared sink for concurrently completing tasks. Every append is atomic.
#[derive(Debug, Default)]
pub struct Aggregator {
    inner: Mutex<FuzzOutcome>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt and, for findings, its vulnerability, under one lock.
    pub async fn record(&self, attempt: Attempt, vulnerability: Option<Vulnerability>) {
        let mut inner = self.inner.lock().await;
        inner.attempts.push(attempt);
        if let Some(v) = vulnerability {
            inner.vulnerabilities.push(v);
        }
    }

    pub async fn attempt_count(&self) -> usize {
        self.inner.lock().await.attempts.len()
    }

    pub async fn snapshot(&self) -> FuzzOutcome {
        self.inner.lock().await.clone()
    }
}
