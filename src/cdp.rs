//! Chrome DevTools Protocol renderer

use crate::{Error, RenderedPage, Renderer, Result, SnapshotConfig};
use headless_chrome::browser::tab::Tab;
use headless_chrome::{Browser, LaunchOptions};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// How often the page's load state is sampled while waiting for quiescence
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resource timing entries the page may buffer. Browsers default to 250,
/// after which the entry count stops growing.
const RESOURCE_BUFFER_SIZE: usize = 100_000;

/// Document readiness plus the number of resource entries seen so far
fn load_state_script() -> String {
    format!(
        r#"(() => {{
    performance.setResourceTimingBufferSize({});
    return JSON.stringify({{
        ready: document.readyState,
        resources: performance.getEntriesByType('resource').length
    }});
}})()"#,
        RESOURCE_BUFFER_SIZE
    )
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct LoadState {
    ready: String,
    resources: usize,
}

/// Headless Chrome renderer (uses the `headless_chrome` crate)
///
/// Every call to [`render`](Renderer::render) launches a fresh browser with a
/// throwaway profile and tears it down before returning, so no cookies or
/// cache carry over between runs.
pub struct CdpRenderer {
    config: SnapshotConfig,
}

impl CdpRenderer {
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        if config.network_idle_ms > config.timeout_ms {
            return Err(Error::ConfigError(format!(
                "network idle window ({}ms) exceeds the navigation timeout ({}ms)",
                config.network_idle_ms, config.timeout_ms
            )));
        }
        Ok(Self { config })
    }

    fn launch(&self) -> Result<Browser> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox)
            .window_size(Some((self.config.viewport.width, self.config.viewport.height)))
            .path(self.config.chrome_path.clone())
            .idle_browser_timeout(Duration::from_millis(self.config.timeout_ms.saturating_mul(2)))
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

        Browser::new(launch_options).map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))
    }

    fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedPage> {
        let tab = browser
            .new_tab()
            .map_err(|e| Error::LaunchError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(self.config.timeout_ms));

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| Error::RenderError(format!("Failed to set user agent: {}", e)))?;

        if !self.config.headers.is_empty() {
            // headless_chrome expects a HashMap<&str, &str>
            let headers: std::collections::HashMap<&str, &str> = self
                .config
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            tab.set_extra_http_headers(headers)
                .map_err(|e| Error::RenderError(format!("Failed to set headers: {}", e)))?;
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);

        tab.navigate_to(url)
            .map_err(|e| Error::RenderError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::RenderError(format!("Wait for navigation failed: {}", e)))?;

        let state_script = load_state_script();
        self.wait_for_network_idle(&tab, &state_script, deadline)?;

        let html = tab.get_content()?;
        let base_url = tab.get_url();

        Ok(RenderedPage { html, base_url })
    }

    /// Block until the document is complete and no new resource entries have
    /// appeared for `network_idle_ms`.
    fn wait_for_network_idle(&self, tab: &Tab, state_script: &str, deadline: Instant) -> Result<()> {
        let window = Duration::from_millis(self.config.network_idle_ms);
        let mut last: Option<LoadState> = None;
        let mut quiet_since = Instant::now();

        loop {
            let state = read_load_state(tab, state_script)?;
            if last.as_ref() != Some(&state) {
                quiet_since = Instant::now();
                last = Some(state);
            } else if state.ready == "complete" && quiet_since.elapsed() >= window {
                log::debug!("network idle after {} resources", state.resources);
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(Error::Timeout(self.config.timeout_ms));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_load_state(tab: &Tab, script: &str) -> Result<LoadState> {
    let remote = tab
        .evaluate(script, false)
        .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;

    let raw = remote
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::RenderError("load state script returned no value".into()))?;

    serde_json::from_str(raw).map_err(|e| Error::RenderError(format!("Malformed load state: {}", e)))
}

impl Renderer for CdpRenderer {
    fn name(&self) -> &'static str {
        "cdp"
    }

    fn render(&mut self, url: &str) -> Result<RenderedPage> {
        let browser = self.launch()?;
        let result = self.capture(&browser, url);
        // Kills the Chrome child process
        drop(browser);
        result
    }
}
