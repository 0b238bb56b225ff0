//! Error types for the snapshot pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that terminate a snapshot run
///
/// Per-resource download failures are not represented here; they are
/// reported as [`FetchError`](crate::fetch::FetchError) and handled by the
/// inlining loop without ending the run.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied an unusable URL
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The browser (or HTTP client) could not be started
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// Navigation or content extraction failed
    #[error("Failed to render page: {0}")]
    RenderError(String),

    /// The page did not settle before the configured bound
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The rendered markup could not be turned into a document
    #[error("Failed to parse document: {0}")]
    ParseError(String),

    /// The snapshot could not be written to disk
    #[error("Failed to write snapshot: {0}")]
    PersistError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
