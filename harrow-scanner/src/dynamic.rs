//! Dynamic crawl phase: breadth-first discovery over rendered pages, with
//! form and input extraction from the live DOM.

use crate::error::ScanError;
use crate::extractor::{extract_forms, extract_links};
use crate::normalize::{canonicalize, is_same_origin};
use crate::render::Renderer;
use crate::result::ExtractionResult;
use crate::robots::RobotsPolicy;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub struct DynamicCrawler {
    renderer: Arc<dyn Renderer>,
    page_load_timeout: Duration,
}

impl DynamicCrawler {
    pub fn new(renderer: Arc<dyn Renderer>, page_load_timeout: Duration) -> Self {
        Self {
            renderer,
            page_load_timeout,
        }
    }

    /// BFS from `entry`, appending one extraction record per rendered page.
    ///
    /// `visited` and `results` are shared across entries of the same run so a
    /// page reached from two entries is only rendered and extracted once.
    pub async fn crawl_dynamic(
        &self,
        entry: &str,
        max_depth: usize,
        visited: &mut HashSet<String>,
        results: &mut Vec<ExtractionResult>,
        robots: &RobotsPolicy,
    ) {
        let origin = match Url::parse(entry) {
            Ok(u) => u,
            Err(e) => {
                warn!("Skipping dynamic crawl of invalid entry {}: {}", entry, e);
                return;
            }
        };

        // Pages that failed or were refused in this invocation; never retried.
        let mut skipped: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        frontier.push_back((canonicalize(&origin), 0));

        while let Some((url, depth)) = frontier.pop_front() {
            if depth > max_depth || visited.contains(&url) || skipped.contains(&url) {
                continue;
            }
            let Ok(requested) = Url::parse(&url) else {
                continue;
            };
            if !robots.can_fetch(&requested) {
                debug!("robots.txt disallows {}", url);
                skipped.insert(url);
                continue;
            }

            let rendered = match tokio::time::timeout(
                self.page_load_timeout,
                self.renderer.render(&requested),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ScanError::RenderTimeout {
                    url: url.clone(),
                    timeout: self.page_load_timeout,
                }),
            };
            let page = match rendered {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}, skipping extraction", e);
                    skipped.insert(url);
                    continue;
                }
            };

            // The redirect target is a different page; check it again.
            let real_url = canonicalize(&page.final_url);
            if !is_same_origin(&page.final_url, &origin) {
                info!("{} redirected off-origin to {}, skipping", url, page.final_url);
                skipped.insert(url);
                continue;
            }
            if !robots.can_fetch(&page.final_url) {
                info!("{} redirected to robots-disallowed {}", url, real_url);
                skipped.insert(url);
                continue;
            }
            if real_url != url && visited.contains(&real_url) {
                debug!("{} redirected to already visited {}", url, real_url);
                visited.insert(url);
                continue;
            }

            visited.insert(url.clone());
            visited.insert(real_url.clone());

            let (forms, independent_inputs) = extract_forms(&page.html, &page.final_url);
            debug!(
                "{}: {} forms, {} independent inputs",
                real_url,
                forms.len(),
                independent_inputs.len()
            );
            results.push(ExtractionResult {
                url: real_url,
                forms,
                independent_inputs,
            });

            if depth < max_depth {
                for link in extract_links(&page.html, &page.final_url, &origin) {
                    if !visited.contains(&link) {
                        frontier.push_back((link, depth + 1));
                    }
                }
            }
        }
    }
}
