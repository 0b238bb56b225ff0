//! Sitesnap
//!
//! Renders a web page in a headless browser, inlines every image, stylesheet
//! and external script it references, and archives the result as a single
//! offline-viewable HTML file.
//!
//! # Features
//!
//! - **CDP Backend** (default): renders through headless Chrome, so the
//!   archived markup reflects the page after its scripts have run
//! - **Simple Backend**: plain HTTP fetch of the server markup, no browser
//! - **Best-effort inlining**: a resource that cannot be downloaded stays
//!   external; only render, parse and write failures end a run
//!
//! # Example
//!
//! ```no_run
//! use sitesnap::{SnapshotConfig, SnapshotRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SnapshotConfig {
//!     output_root: "archives".into(),
//!     ..Default::default()
//! };
//!
//! let request = SnapshotRequest::new("https://example.com")?;
//! let completion = sitesnap::worker::spawn(request, config).wait();
//! println!("{}", completion.message);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "cdp")]
pub mod cdp;

// HTTP-only renderer (no JS); always available
pub mod simple;

pub mod archive;
pub mod document;
pub mod events;
pub mod fetch;
pub mod pipeline;
pub mod resource;
pub mod worker;

pub use archive::{ArchiveWriter, SnapshotArtifact};
pub use events::{Completion, ProgressSink, SnapshotEvent};
pub use pipeline::{Phase, SnapshotPipeline};

/// Rendering backend used to obtain the page markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Headless Chrome over the DevTools protocol (requires the `cdp` feature)
    Cdp,
    /// Plain HTTP GET; scripts are not executed
    Simple,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "cdp") {
            Backend::Cdp
        } else {
            Backend::Simple
        }
    }
}

/// Configuration for a snapshot run
///
/// The defaults are conservative: navigation is bounded to 30 seconds, the
/// network must be quiet for half a second before the page counts as loaded,
/// and each resource download gets 10 seconds.
///
/// # Examples
///
/// ```
/// let cfg = sitesnap::SnapshotConfig::default();
/// assert_eq!(cfg.fetch_timeout_ms, 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// User agent string sent by the browser and the resource fetcher
    pub user_agent: String,
    /// Browser window dimensions
    pub viewport: Viewport,
    /// Upper bound for navigation plus network quiescence, in milliseconds
    pub timeout_ms: u64,
    /// How long the network must stay quiet before the page counts as loaded
    pub network_idle_ms: u64,
    /// Timeout for each resource download, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Extra HTTP headers sent with the page navigation
    pub headers: HashMap<String, String>,
    /// Which renderer to use
    pub backend: Backend,
    /// Explicit Chrome/Chromium executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep Chrome's sandbox enabled
    pub sandbox: bool,
    /// Directory under which `site_<timestamp>` folders are created
    pub output_root: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 sitesnap/0.1".to_string(),
            viewport: Viewport::default(),
            timeout_ms: 30_000,
            network_idle_ms: 500,
            fetch_timeout_ms: 10_000,
            headers: HashMap::new(),
            backend: Backend::default(),
            chrome_path: None,
            sandbox: true,
            output_root: PathBuf::from("."),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// The page a caller asked to archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    url: String,
}

impl SnapshotRequest {
    /// Validate and normalize user input.
    ///
    /// Surrounding whitespace is trimmed and a schemeless address such as
    /// `example.com/docs` is given `https://`.
    pub fn new(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidRequest("enter a valid URL".into()));
        }

        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let parsed = url::Url::parse(&candidate)
            .map_err(|e| Error::InvalidRequest(format!("{}: {}", input, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidRequest(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self { url: candidate })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Markup captured from a rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Serialized DOM after scripts have run
    pub html: String,
    /// Final URL after redirects, used to resolve relative references
    pub base_url: String,
}

/// A backend that turns a URL into rendered markup
pub trait Renderer {
    /// Short backend name used in log output
    fn name(&self) -> &'static str;

    /// Navigate to `url`, wait for the page to settle and capture its markup.
    fn render(&mut self, url: &str) -> Result<RenderedPage>;
}

/// Create the renderer selected by `config.backend`
pub fn new_renderer(config: &SnapshotConfig) -> Result<Box<dyn Renderer>> {
    match config.backend {
        #[cfg(feature = "cdp")]
        Backend::Cdp => Ok(Box::new(cdp::CdpRenderer::new(config.clone())?)),
        #[cfg(not(feature = "cdp"))]
        Backend::Cdp => Err(Error::ConfigError(
            "the cdp backend is not compiled in; rebuild with the `cdp` feature".into(),
        )),
        Backend::Simple => Ok(Box::new(simple::SimpleRenderer::new(config)?)),
    }
}
