//! Best-effort download of a single resource
//!
//! Every failure is returned as a [`FetchError`] value; the caller decides
//! to keep the original reference and move on.

use crate::{Error, Result, SnapshotConfig};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a resource could not be downloaded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Body and declared type of a downloaded resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// `Content-Type` header as sent by the server, if any
    pub content_type: Option<String>,
}

impl FetchedResource {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn content_type_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.content_type.as_deref().unwrap_or(fallback)
    }
}

/// HTTP GET with a fixed per-request timeout
pub struct ResourceFetcher {
    client: Client,
    timeout_ms: u64,
}

impl ResourceFetcher {
    pub fn new(config: &SnapshotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_ms: config.fetch_timeout_ms,
        })
    }

    /// Download `url`. Non-2xx statuses count as failure.
    pub fn fetch(&self, url: &Url) -> std::result::Result<FetchedResource, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let resp = self.client.get(url.as_str()).send().map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let bytes = resp.bytes().map_err(classify)?.to_vec();
        log::debug!(
            "fetched {} ({} bytes, timeout {}ms)",
            url,
            bytes.len(),
            self.timeout_ms
        );

        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_once(status: u16, content_type: Option<&'static str>, body: &'static [u8]) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();

        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let mut response = tiny_http::Response::from_data(body.to_vec()).with_status_code(status);
                if let Some(ct) = content_type {
                    let header = format!("Content-Type: {}", ct).parse::<tiny_http::Header>().unwrap();
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        format!("http://{}/resource", addr)
    }

    fn fetcher() -> ResourceFetcher {
        let config = SnapshotConfig {
            fetch_timeout_ms: 2_000,
            ..Default::default()
        };
        ResourceFetcher::new(&config).expect("fetcher")
    }

    #[test]
    fn fetch_returns_bytes_and_content_type() {
        let url = serve_once(200, Some("text/css"), b"body{color:red}");
        let res = fetcher().fetch(&Url::parse(&url).unwrap()).unwrap();
        assert_eq!(res.bytes, b"body{color:red}");
        assert_eq!(res.content_type.as_deref(), Some("text/css"));
        assert_eq!(res.text(), "body{color:red}");
    }

    #[test]
    fn fetch_treats_non_success_status_as_failure() {
        let url = serve_once(404, None, b"Not Found");
        let err = fetcher().fetch(&Url::parse(&url).unwrap()).unwrap_err();
        assert_eq!(err, FetchError::Status(404));
    }

    #[test]
    fn fetch_reports_connection_failure() {
        let err = fetcher()
            .fetch(&Url::parse("http://127.0.0.1:1/unreachable.png").unwrap())
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_) | FetchError::Timeout));
    }

    #[test]
    fn fetch_rejects_non_http_urls() {
        let err = fetcher()
            .fetch(&Url::parse("data:image/png;base64,AAAA").unwrap())
            .unwrap_err();
        assert_eq!(err, FetchError::UnsupportedScheme("data".into()));
    }

    #[test]
    fn content_type_fallback() {
        let res = FetchedResource {
            bytes: Vec::new(),
            content_type: None,
        };
        assert_eq!(res.content_type_or("image/png"), "image/png");
    }
}
