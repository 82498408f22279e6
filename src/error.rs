//! Error types for the score2pdf library.
//!
//! Two error types reflect two levels of failure:
//!
//! * [`Score2PdfError`] — **Fatal**: the document cannot be produced (no host
//!   state, empty page list, a page could not be loaded, serialisation or
//!   save failed). Returned as `Err(Score2PdfError)` from
//!   [`crate::generate::PdfGenerator::generate`].
//!
//! * [`PageError`] — what went wrong while acquiring one page. A page error
//!   aborts the whole generation; it travels inside
//!   [`Score2PdfError::PageLoadFailed`] together with the 1-indexed page
//!   number so callers can tell which page broke.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the score2pdf library.
#[derive(Debug, Error)]
pub enum Score2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The score-player state object is absent or lacks required fields.
    ///
    /// Callers augmenting a host page treat this as a silent no-op.
    #[error("Score player state is missing or incomplete: {reason}")]
    MissingHostState { reason: String },

    /// The page source is empty; a PDF needs at least one page.
    #[error("No pages to assemble")]
    NoPages,

    // ── Acquisition errors ────────────────────────────────────────────────
    /// A page image could not be fetched or decoded.
    #[error("Page {page} could not be loaded: {source}")]
    PageLoadFailed {
        page: usize,
        #[source]
        source: PageError,
    },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// Embedding or serialising the document failed.
    #[error("PDF serialisation failed: {0}")]
    Serialization(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The save target could not write the finished document.
    #[error("Failed to save PDF to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure to acquire a single page image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Network request failed or returned a non-success status.
    #[error("failed to fetch '{url}': {reason}")]
    FetchFailed {
        url: String,
        reason: String,
        /// Whether retrying the request could plausibly succeed.
        transient: bool,
    },

    /// The request did not complete within the fetch timeout.
    #[error("fetching '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// A local page file does not exist or cannot be read.
    #[error("page file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The bytes arrived but are not a valid image of the expected format.
    #[error("could not decode '{url}': {detail}")]
    DecodeFailed { url: String, detail: String },
}

impl PageError {
    /// True when a retry has a chance of succeeding.
    ///
    /// Timeouts, connection errors, HTTP 5xx and 429 are transient. Missing
    /// files, 4xx responses and undecodable content are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PageError::FetchFailed { transient, .. } => *transient,
            PageError::Timeout { .. } => true,
            PageError::NotFound { .. } | PageError::DecodeFailed { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_load_failed_display() {
        let e = Score2PdfError::PageLoadFailed {
            page: 3,
            source: PageError::Timeout {
                url: "https://example.com/score_2.png".into(),
                secs: 30,
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
    }

    #[test]
    fn missing_host_state_display() {
        let e = Score2PdfError::MissingHostState {
            reason: "no urls.image_path".into(),
        };
        assert!(e.to_string().contains("image_path"));
    }

    #[test]
    fn transient_classification() {
        assert!(PageError::Timeout {
            url: "u".into(),
            secs: 1
        }
        .is_transient());
        assert!(PageError::FetchFailed {
            url: "u".into(),
            reason: "HTTP 503".into(),
            transient: true,
        }
        .is_transient());
        assert!(!PageError::FetchFailed {
            url: "u".into(),
            reason: "HTTP 404".into(),
            transient: false,
        }
        .is_transient());
        assert!(!PageError::DecodeFailed {
            url: "u".into(),
            detail: "bad png".into(),
        }
        .is_transient());
        assert!(!PageError::NotFound {
            path: PathBuf::from("/nope.svg"),
        }
        .is_transient());
    }
}
