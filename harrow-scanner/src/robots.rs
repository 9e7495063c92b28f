//! robots.txt policy consulted before every crawl visit.

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Rules from the `User-agent: *` groups of a robots.txt file.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    rules: Vec<Rule>,
}

impl RobotsPolicy {
    /// A policy that allows every URL.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Fetch `/robots.txt` relative to the seed. Any failure degrades to allow-all.
    pub async fn fetch(client: &Client, seed: &Url) -> Self {
        let robots_url = match seed.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", seed, e);
                return Self::allow_all();
            }
        };

        let response = match client.get(robots_url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("robots.txt fetch failed ({}), allowing all: {}", robots_url, e);
                return Self::allow_all();
            }
        };

        if !response.status().is_success() {
            debug!(
                "robots.txt returned {} at {}, allowing all",
                response.status(),
                robots_url
            );
            return Self::allow_all();
        }

        match response.text().await {
            Ok(body) => {
                let policy = Self::parse(&body);
                info!("Loaded {} robots.txt rules from {}", policy.rules.len(), robots_url);
                policy
            }
            Err(e) => {
                warn!("robots.txt body unreadable ({}), allowing all: {}", robots_url, e);
                Self::allow_all()
            }
        }
    }

    pub fn parse(body: &str) -> Self {
        let mut rules = Vec::new();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    if value.is_empty() || !group_agents.iter().any(|a| a == "*") {
                        continue;
                    }
                    rules.push(Rule {
                        allow: key == "allow",
                        pattern: value.to_string(),
                    });
                }
                _ => {}
            }
        }

        Self { rules }
    }

    /// Longest matching rule wins; on a tie `Allow` wins; no match allows.
    pub fn can_fetch(&self, url: &Url) -> bool {
        let target = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let mut best: Option<&Rule> = None;
        for rule in self.rules.iter().filter(|r| pattern_matches(&r.pattern, &target)) {
            best = match best {
                Some(current)
                    if current.pattern.len() > rule.pattern.len()
                        || (current.pattern.len() == rule.pattern.len() && current.allow) =>
                {
                    Some(current)
                }
                _ => Some(rule),
            };
        }

        best.map(|r| r.allow).unwrap_or(true)
    }

    pub fn can_fetch_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.can_fetch(&u)).unwrap_or(false)
    }
}

/// Prefix match with `*` wildcards and an optional `$` end anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    if !path.starts_with(first) {
        return false;
    }

    let mut pos = first.len();
    for part in rest.iter().filter(|p| !p.is_empty()) {
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }

    if !anchored {
        return true;
    }
    match rest.last() {
        None => path.len() == first.len(),
        Some(last) if last.is_empty() => true,
        Some(last) => path.ends_with(last),
    }
}
