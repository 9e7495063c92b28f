//! Payload catalog: category → payload list, loaded once per run.

use crate::error::{HarrowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

const DEFAULT_CATALOG: &str = include_str!("../payloads/default.json");

/// Vulnerability classes the dispatcher can exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SqlInjection,
    Xss,
    CommandInjection,
    PathTraversal,
    Ssti,
    OpenRedirect,
    Csrf,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::SqlInjection,
        Category::Xss,
        Category::CommandInjection,
        Category::PathTraversal,
        Category::Ssti,
        Category::OpenRedirect,
        Category::Csrf,
    ];

    /// Catalog key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SqlInjection => "sql_injection",
            Category::Xss => "xss",
            Category::CommandInjection => "command_injection",
            Category::PathTraversal => "path_traversal",
            Category::Ssti => "ssti",
            Category::OpenRedirect => "open_redirect",
            Category::Csrf => "csrf",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::SqlInjection => "SQL Injection",
            Category::Xss => "Cross-Site Scripting",
            Category::CommandInjection => "Command Injection",
            Category::PathTraversal => "Path Traversal",
            Category::Ssti => "Server-Side Template Injection",
            Category::OpenRedirect => "Open Redirect",
            Category::Csrf => "Cross-Site Request Forgery",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = HarrowError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| HarrowError::ConfigError(format!("Unknown payload category '{}'", s)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayloadCatalog {
    entries: BTreeMap<Category, Vec<String>>,
}

impl PayloadCatalog {
    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(DEFAULT_CATALOG)
    }

    /// Load from `path`, or the bundled catalog when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::bundled();
        };
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let content = fs::read_to_string(&expanded).map_err(|e| {
            HarrowError::ConfigError(format!("Failed to read payload catalog {}: {}", expanded, e))
        })?;
        let catalog = Self::from_json(&content)?;
        info!("Loaded {} payloads from {}", catalog.total(), expanded);
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(content)
            .map_err(|e| HarrowError::ConfigError(format!("Malformed payload catalog: {}", e)))?;

        let mut entries = BTreeMap::new();
        for (key, payloads) in raw {
            let Ok(category) = key.parse::<Category>() else {
                warn!("Skipping unknown payload category '{}'", key);
                continue;
            };
            let payloads: Vec<String> = payloads.into_iter().filter(|p| !p.is_empty()).collect();
            entries.insert(category, payloads);
        }
        Ok(Self { entries })
    }

    /// Keep only the selected categories. Fails when nothing fuzzable remains.
    pub fn filtered(mut self, selected: &[Category]) -> Result<Self> {
        self.entries
            .retain(|category, payloads| selected.contains(category) && !payloads.is_empty());
        if self.entries.is_empty() {
            return Err(HarrowError::ConfigError(format!(
                "No payloads left for the selected categories ({})",
                selected
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(self)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.entries.keys().copied().collect()
    }

    pub fn payloads(&self, category: Category) -> &[String] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &String)> {
        self.entries
            .iter()
            .flat_map(|(category, payloads)| payloads.iter().map(move |p| (*category, p)))
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
