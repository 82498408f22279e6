//! Result types returned by the generator.

use crate::format::ImageFormat;
use serde::Serialize;
use std::sync::Arc;

/// A finished PDF and what is known about how it was made.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledDocument {
    /// The serialised PDF. Shared with the generator's cache slot.
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    /// File name the document was saved under, including `.pdf`.
    pub file_name: String,
    pub page_count: usize,
    pub format: ImageFormat,
    /// True when the cached document was reused instead of rebuilt.
    pub from_cache: bool,
    /// Fingerprint of the ordered page URLs (cache key).
    pub fingerprint: String,
    pub byte_len: usize,
    /// Wall-clock time of this request, cache hits included.
    pub duration_ms: u64,
}
