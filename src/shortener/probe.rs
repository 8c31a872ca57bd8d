//! Target URL probing
//!
//! Creation only accepts targets that answer with a 2xx. The probe also
//! captures the page's `<title>` so links created without an explicit title
//! inherit the target page's.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Target answered with a 2xx status
    pub reachable: bool,
    /// `<title>` of the fetched page, when present
    pub title: Option<String>,
}

#[async_trait]
pub trait TargetProbe: Send + Sync {
    /// Fetch the candidate target. `Err` means the fetch itself failed
    /// (DNS, connect, timeout); callers treat that the same as unreachable.
    async fn probe(&self, url: &str) -> Result<ProbeOutcome>;
}

pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build target probe client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TargetProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", url))?;

        if !response.status().is_success() {
            return Ok(ProbeOutcome {
                reachable: false,
                title: None,
            });
        }

        let body = response.text().await.unwrap_or_default();

        Ok(ProbeOutcome {
            reachable: true,
            title: extract_title(&body),
        })
    }
}

/// Pull the text of the first `<title>` element out of an HTML document.
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();

    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;

    let title = html[content_start..content_end].trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
