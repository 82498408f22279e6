//! Page fetching: turn a page URL into raw bytes.
//!
//! The generator never talks to the network directly. It asks a
//! [`PageLoader`] for bytes, which keeps the acquisition logic testable with
//! an in-memory loader and lets embedders plug in their own transport
//! (authenticated clients, caches, a browser bridge).
//!
//! [`HttpPageLoader`] is the default: `http(s)://` through a shared
//! `reqwest::Client`, `file://` URLs and bare paths through `tokio::fs`.

use crate::error::PageError;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Source of raw page bytes.
pub trait PageLoader: Send + Sync {
    /// Fetch the resource behind `url`.
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, PageError>>;
}

/// Check if the input string looks like an HTTP URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Default loader: HTTP(S) via reqwest, everything else from disk.
#[derive(Debug, Clone)]
pub struct HttpPageLoader {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPageLoader {
    /// Build a loader whose requests time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, PageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("score2pdf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PageError::FetchFailed {
                url: String::new(),
                reason: format!("HTTP client setup failed: {e}"),
                transient: false,
            })?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn load_http(&self, url: &str) -> Result<Vec<u8>, PageError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                PageError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                PageError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                    transient: e.is_connect() || e.is_request(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
                transient: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let bytes = response.bytes().await.map_err(|e| PageError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
            transient: true,
        })?;

        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn load_local(&self, url: &str) -> Result<Vec<u8>, PageError> {
        let path = local_path(url);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} ({} bytes)", path.display(), bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PageError::NotFound { path })
            }
            Err(e) => Err(PageError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
                transient: false,
            }),
        }
    }
}

impl PageLoader for HttpPageLoader {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, PageError>> {
        Box::pin(async move {
            if is_url(url) {
                self.load_http(url).await
            } else {
                self.load_local(url).await
            }
        })
    }
}

/// Map a `file://` URL or a plain path to a filesystem path.
fn local_path(url: &str) -> PathBuf {
    if url.starts_with("file://") {
        if let Ok(parsed) = reqwest::Url::parse(url) {
            if let Ok(path) = parsed.to_file_path() {
                return path;
            }
        }
    }
    PathBuf::from(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/score_0.svg"));
        assert!(is_url("http://example.com/score_0.png"));
        assert!(!is_url("/tmp/score_0.svg"));
        assert!(!is_url("file:///tmp/score_0.svg"));
        assert!(!is_url(""));
    }

    #[test]
    fn local_path_from_file_url() {
        #[cfg(unix)]
        assert_eq!(
            local_path("file:///tmp/score_0.svg"),
            PathBuf::from("/tmp/score_0.svg")
        );
        assert_eq!(local_path("pages/score_0.svg"), PathBuf::from("pages/score_0.svg"));
    }

    #[tokio::test]
    async fn loads_local_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<svg/>").unwrap();
        let loader = HttpPageLoader::new(5).unwrap();
        let bytes = loader.load(tmp.path().to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"<svg/>");
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let loader = HttpPageLoader::new(5).unwrap();
        let err = loader
            .load("/definitely/not/a/real/score_0.svg")
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::NotFound { .. }));
        assert!(!err.is_transient());
    }
}
