use crate::error::{Result, ScanError};
use crate::extractor::extract_links;
use crate::normalize::{canonicalize, is_same_origin, resolve_href};
use crate::robots::RobotsPolicy;
use reqwest::Client;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Called with `(depth, url)` for every page the crawler fetches.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_USER_AGENT: &str = "Harrow/0.1 (https://github.com/trapdoorsec/harrow)";

/// Client for the static crawl: no cookie jar, and redirects are returned
/// to the crawler so every hop goes through the robots and origin checks.
pub fn crawl_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    build_client(user_agent, timeout_secs, reqwest::redirect::Policy::none())
}

/// Client for [`HttpRenderer`](crate::render::HttpRenderer): follows up to 5
/// redirects like a browser would.
pub fn render_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    build_client(user_agent, timeout_secs, reqwest::redirect::Policy::limited(5))
}

fn build_client(
    user_agent: &str,
    timeout_secs: u64,
    redirect: reqwest::redirect::Policy,
) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(redirect)
        .build()?;
    Ok(client)
}

struct Fetched {
    status: u16,
    location: Option<String>,
    body: Option<String>,
}

/// Static-phase crawler: breadth-first same-origin discovery over plain HTTP.
pub struct Crawler {
    client: Client,
    max_depth: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_depth: 3,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Returns the canonical URLs that answered 2xx.
    ///
    /// Robots-disallowed pages, non-2xx pages, and transport failures are
    /// skipped without enqueuing their links; none of them is fatal. A 3xx
    /// with a same-origin `Location` queues the target at the same depth.
    pub async fn crawl(&self, seed: &str, robots: &RobotsPolicy) -> Result<BTreeSet<String>> {
        let origin = Url::parse(seed)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed, e)))?;
        info!("Starting static crawl of {} (max depth {})", origin, self.max_depth);

        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        let mut found = BTreeSet::new();
        frontier.push_back((canonicalize(&origin), 0));

        while let Some((url, depth)) = frontier.pop_front() {
            if depth > self.max_depth || !visited.insert(url.clone()) {
                continue;
            }

            let Ok(parsed) = Url::parse(&url) else {
                continue;
            };
            if !robots.can_fetch(&parsed) {
                info!("robots.txt disallows {}", url);
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(depth, url.clone());
            }

            let Fetched {
                status,
                location,
                body,
            } = match self.fetch(&parsed).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    continue;
                }
            };
            if (300..400).contains(&status) {
                match location.as_deref().and_then(|l| resolve_href(&parsed, l)) {
                    Some(target) if is_same_origin(&target, &origin) => {
                        let target = canonicalize(&target);
                        debug!("{} redirects to {}", url, target);
                        if !visited.contains(&target) {
                            frontier.push_back((target, depth));
                        }
                    }
                    Some(target) => info!("{} redirects off-origin to {}, skipping", url, target),
                    None => warn!("{} answered {} without a usable Location", url, status),
                }
                continue;
            }
            if !(200..300).contains(&status) {
                warn!("Skipping {} (status {})", url, status);
                continue;
            }
            found.insert(url.clone());

            if depth == self.max_depth {
                continue;
            }
            if let Some(html) = body {
                for link in extract_links(&html, &parsed, &origin) {
                    if !visited.contains(&link) {
                        debug!("Queuing {} at depth {}", link, depth + 1);
                        frontier.push_back((link, depth + 1));
                    }
                }
            }
        }

        info!("Static crawl complete. {} pages reachable", found.len());
        Ok(found)
    }

    /// Status, redirect target, and the body when the response looks like HTML.
    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        debug!("Fetching {}", url);
        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = if is_html && location.is_none() {
            Some(response.text().await?)
        } else {
            None
        };
        debug!("{} answered {} in {:?}", url, status, start.elapsed());
        Ok(Fetched {
            status,
            location,
            body,
        })
    }
}
