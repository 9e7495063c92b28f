use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Render failed for {url}: {reason}")]
    RenderError { url: String, reason: String },

    #[error("Render timed out after {timeout:?}: {url}")]
    RenderTimeout { url: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, ScanError>;
