//! Single-slot memo of the last assembled document.
//!
//! The slot is keyed by a fingerprint of the ordered page URLs. Asking again
//! for the same pages (even under a different file name) is a hit; a
//! different page list is a miss and the next success replaces the slot.

use sha2::{Digest, Sha256};
use std::sync::Arc;

/// SHA-256 over the ordered URL list, hex encoded.
///
/// URLs are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<S: AsRef<str>>(urls: &[S]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        let url = url.as_ref();
        hasher.update((url.len() as u64).to_le_bytes());
        hasher.update(url.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// A cached document and the page list it was built from.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub fingerprint: String,
    pub bytes: Arc<[u8]>,
    pub page_count: usize,
    pub format: crate::format::ImageFormat,
}

/// The cache slot.
#[derive(Debug, Default)]
pub struct DocumentCache {
    slot: Option<CachedDocument>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached document if it was built from the same page list.
    pub fn lookup(&self, fingerprint: &str) -> Option<&CachedDocument> {
        self.slot.as_ref().filter(|doc| doc.fingerprint == fingerprint)
    }

    /// Replace the slot.
    pub fn store(&mut self, doc: CachedDocument) {
        self.slot = Some(doc);
    }

    /// Drop whatever is cached.
    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;

    fn doc(fp: &str) -> CachedDocument {
        CachedDocument {
            fingerprint: fp.to_string(),
            bytes: Arc::from(&b"%PDF"[..]),
            page_count: 1,
            format: ImageFormat::Svg,
        }
    }

    #[test]
    fn fingerprint_depends_on_order_and_boundaries() {
        let a = fingerprint(&["p0.svg", "p1.svg"]);
        assert_eq!(a, fingerprint(&["p0.svg".to_string(), "p1.svg".to_string()]));
        assert_ne!(a, fingerprint(&["p1.svg", "p0.svg"]));
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn lookup_matches_fingerprint_only() {
        let mut cache = DocumentCache::new();
        assert!(cache.lookup("x").is_none());

        cache.store(doc("x"));
        assert!(cache.lookup("x").is_some());
        assert!(cache.lookup("y").is_none());

        cache.store(doc("y"));
        assert!(cache.lookup("x").is_none());
        assert!(cache.lookup("y").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
