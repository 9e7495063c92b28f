//! Run configuration: defaults, optional TOML file, then command-line overrides.

use crate::error::{HarrowError, Result};
use crate::payloads::Category;
use harrow_scanner::crawler::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Thresholds used by the detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Normalized edit distance above which two bodies count as different.
    pub similarity_threshold: f64,
    pub sqli_delay_margin_secs: f64,
    pub cmd_delay_margin_secs: f64,
    /// Width of the evidence excerpt, in characters.
    pub evidence_width: usize,
    /// Longer bodies are sampled down to this many characters before comparison.
    pub max_compare_chars: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.2,
            sqli_delay_margin_secs: 4.0,
            cmd_delay_margin_secs: 3.0,
            evidence_width: 200,
            max_compare_chars: 2048,
        }
    }
}

/// Optional session bootstrap performed before fuzzing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum AuthConfig {
    #[default]
    None,
    FormLogin {
        login_url: String,
        username_field: String,
        username: String,
        password_field: String,
        password: String,
        /// Body text that marks a rejected login.
        failure_marker: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub target: String,
    pub max_depth: usize,
    pub categories: Vec<Category>,
    pub payloads_path: Option<PathBuf>,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub user_agent: String,
    pub show_progress_bars: bool,
    pub priority_replay: usize,
    pub auth: AuthConfig,
    pub coverage_endpoint: Option<String>,
    pub detection: DetectionConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            max_depth: 2,
            categories: Category::ALL.to_vec(),
            payloads_path: None,
            concurrency: 5,
            request_timeout_secs: 10,
            render_timeout_secs: 15,
            request_delay_ms: 200,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress_bars: false,
            priority_replay: 5,
            auth: AuthConfig::None,
            coverage_endpoint: None,
            detection: DetectionConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Checks the settings that would otherwise fail mid-run and returns the parsed seed.
    pub fn validate(&self) -> Result<Url> {
        let seed = Url::parse(&self.target)
            .map_err(|e| HarrowError::ConfigError(format!("Invalid target '{}': {}", self.target, e)))?;
        if !matches!(seed.scheme(), "http" | "https") || seed.host_str().is_none() {
            return Err(HarrowError::ConfigError(format!(
                "Target must be an http(s) URL with a host: {}",
                self.target
            )));
        }
        if self.concurrency == 0 {
            return Err(HarrowError::ConfigError(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        if self.categories.is_empty() {
            return Err(HarrowError::ConfigError(
                "At least one payload category must be selected".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.similarity_threshold) {
            return Err(HarrowError::ConfigError(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.detection.similarity_threshold
            )));
        }
        if let Some(endpoint) = &self.coverage_endpoint {
            Url::parse(endpoint).map_err(|e| {
                HarrowError::ConfigError(format!("Invalid coverage endpoint '{}': {}", endpoint, e))
            })?;
        }
        Ok(seed)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    scan: Option<ScanSection>,
    fuzz: Option<FuzzSection>,
    detection: Option<DetectionSection>,
    auth: Option<AuthSection>,
    coverage: Option<CoverageSection>,
}

#[derive(Debug, Deserialize)]
struct ScanSection {
    target: Option<String>,
    max_depth: Option<usize>,
    user_agent: Option<String>,
    request_timeout_secs: Option<u64>,
    render_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FuzzSection {
    categories: Option<Vec<String>>,
    payloads: Option<PathBuf>,
    concurrency: Option<usize>,
    request_delay_ms: Option<u64>,
    priority_replay: Option<usize>,
    show_progress_bars: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DetectionSection {
    similarity_threshold: Option<f64>,
    sqli_delay_margin_secs: Option<f64>,
    cmd_delay_margin_secs: Option<f64>,
    evidence_width: Option<usize>,
    max_compare_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AuthSection {
    login_url: String,
    username_field: Option<String>,
    username: String,
    password_field: Option<String>,
    password: String,
    failure_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoverageSection {
    endpoint: Option<String>,
}

/// Loads a TOML configuration file and merges it over the defaults.
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = std::fs::read_to_string(&expanded).map_err(|e| {
        HarrowError::ConfigError(format!("Failed to read config {}: {}", expanded, e))
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<ScanConfig> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut config = ScanConfig::default();

    if let Some(scan) = file_config.scan {
        if let Some(target) = scan.target {
            config.target = target;
        }
        if let Some(depth) = scan.max_depth {
            config.max_depth = depth;
        }
        if let Some(ua) = scan.user_agent {
            config.user_agent = ua;
        }
        if let Some(timeout) = scan.request_timeout_secs {
            config.request_timeout_secs = timeout;
        }
        if let Some(timeout) = scan.render_timeout_secs {
            config.render_timeout_secs = timeout;
        }
    }

    if let Some(fuzz) = file_config.fuzz {
        if let Some(categories) = fuzz.categories {
            config.categories = categories
                .iter()
                .map(|c| c.parse())
                .collect::<Result<Vec<Category>>>()?;
        }
        if fuzz.payloads.is_some() {
            config.payloads_path = fuzz.payloads;
        }
        if let Some(concurrency) = fuzz.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(delay) = fuzz.request_delay_ms {
            config.request_delay_ms = delay;
        }
        if let Some(replay) = fuzz.priority_replay {
            config.priority_replay = replay;
        }
        if let Some(show) = fuzz.show_progress_bars {
            config.show_progress_bars = show;
        }
    }

    if let Some(detection) = file_config.detection {
        let d = &mut config.detection;
        if let Some(v) = detection.similarity_threshold {
            d.similarity_threshold = v;
        }
        if let Some(v) = detection.sqli_delay_margin_secs {
            d.sqli_delay_margin_secs = v;
        }
        if let Some(v) = detection.cmd_delay_margin_secs {
            d.cmd_delay_margin_secs = v;
        }
        if let Some(v) = detection.evidence_width {
            d.evidence_width = v;
        }
        if let Some(v) = detection.max_compare_chars {
            d.max_compare_chars = v.max(1);
        }
    }

    if let Some(auth) = file_config.auth {
        config.auth = AuthConfig::FormLogin {
            login_url: auth.login_url,
            username_field: auth.username_field.unwrap_or_else(|| "username".to_string()),
            username: auth.username,
            password_field: auth.password_field.unwrap_or_else(|| "password".to_string()),
            password: auth.password,
            failure_marker: auth.failure_marker,
        };
    }

    if let Some(coverage) = file_config.coverage {
        config.coverage_endpoint = coverage.endpoint;
    }

    Ok(config)
}
