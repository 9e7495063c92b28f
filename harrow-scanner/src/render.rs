//! Rendering collaborator used by the dynamic crawl phase.
//!
//! A browser driver plugs in behind [`Renderer`]; the bundled [`HttpRenderer`]
//! returns the server-delivered source and the post-redirect URL.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Page source as rendered, plus where the browser actually ended up.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub final_url: Url,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage>;
}

pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// `client` should follow redirects so the final URL is meaningful.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScanError::RenderError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let final_url = response.url().clone();
        debug!("Rendered {} -> {} ({})", url, final_url, response.status());

        let html = response.text().await.map_err(|e| ScanError::RenderError {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(RenderedPage { html, final_url })
    }
}
