//! Progress-callback trait for generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to follow a
//! generation as it runs. The CLI uses it to show a "Processing…" spinner in
//! place of the download label and to restore the label afterwards.
//!
//! # Example
//!
//! ```rust
//! use score2pdf::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     acquired: Arc<AtomicUsize>,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_page_acquired(&self, page_num: usize, total_pages: usize) {
//!         self.acquired.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} fetched", page_num, total_pages);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     acquired: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stage of a single generation request.
///
/// `Idle → Detecting → {BuildingFromSvg | BuildingFromPng} → Serializing →
/// Saved`, or `Idle → Saved` directly on a cache hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    Idle,
    Detecting,
    BuildingFromSvg,
    BuildingFromPng,
    Serializing,
    Saved,
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationState::Idle => "idle",
            GenerationState::Detecting => "detecting format",
            GenerationState::BuildingFromSvg => "building from SVG",
            GenerationState::BuildingFromPng => "building from PNG",
            GenerationState::Serializing => "serializing",
            GenerationState::Saved => "saved",
        };
        f.write_str(s)
    }
}

/// Called by the generator as it works through a request.
///
/// Implementations must be `Send + Sync`: page events fire from concurrent
/// acquisitions. All methods default to no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before any work, cache hits included. The "Processing…"
    /// moment.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages in the page source
    fn on_generation_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called on every state transition.
    fn on_state_change(&self, state: GenerationState) {
        let _ = state;
    }

    /// Called when a page has been fetched and decoded.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the source
    fn on_page_acquired(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page fails; the generation aborts right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called exactly once per request after success **or** failure, so a
    /// UI label toggled in `on_generation_start` can always be restored.
    ///
    /// # Arguments
    /// * `success`    — whether a document was produced and saved
    /// * `from_cache` — whether the cached document was reused
    fn on_generation_complete(&self, success: bool, from_cache: bool) {
        let _ = (success, from_cache);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        acquired: AtomicUsize,
        errors: AtomicUsize,
        states: Mutex<Vec<GenerationState>>,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_state_change(&self, state: GenerationState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_page_acquired(&self, _page_num: usize, _total_pages: usize) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_generation_start(3);
        cb.on_state_change(GenerationState::Detecting);
        cb.on_page_acquired(1, 3);
        cb.on_page_error(2, 3, "timeout");
        cb.on_generation_complete(false, false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_state_change(GenerationState::Detecting);
        tracker.on_state_change(GenerationState::BuildingFromPng);
        tracker.on_page_acquired(1, 2);
        tracker.on_page_error(2, 2, "HTTP 404");

        assert_eq!(tracker.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.states.lock().unwrap(),
            vec![GenerationState::Detecting, GenerationState::BuildingFromPng]
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(GenerationState::BuildingFromSvg.to_string(), "building from SVG");
        assert_eq!(GenerationState::Saved.to_string(), "saved");
    }
}
