//! A lightweight, browser-less renderer.
//!
//! Performs a plain HTTP GET (following redirects) and hands back the server
//! markup unchanged. Scripts are not executed, so pages that build their
//! content client-side are archived as the server sent them.

use crate::{Error, RenderedPage, Renderer, Result, SnapshotConfig};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// HTTP-only renderer
pub struct SimpleRenderer {
    client: Client,
}

impl SimpleRenderer {
    pub fn new(config: &SnapshotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(header_map(config)?)
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn header_map(config: &SnapshotConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::ConfigError(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::ConfigError(format!("header '{}' value: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

impl Renderer for SimpleRenderer {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn render(&mut self, url: &str) -> Result<RenderedPage> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                Error::RenderError(format!("Request to {} timed out", url))
            } else {
                Error::RenderError(format!("Request failed: {}", e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RenderError(format!("{} returned HTTP {}", url, status)));
        }

        let base_url = resp.url().to_string();
        let html = resp
            .text()
            .map_err(|e| Error::RenderError(format!("Failed to read body: {}", e)))?;

        Ok(RenderedPage { html, base_url })
    }
}
