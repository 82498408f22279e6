//! # score2pdf
//!
//! Assemble a multi-page PDF from the per-page images of an online score
//! (sheet music served one SVG or PNG per page).
//!
//! ## Pipeline Overview
//!
//! ```text
//! host state (JSON)
//!  │
//!  ├─ 1. Score    read id, title, page count, asset base URL
//!  ├─ 2. Pages    build score_<N>.<ext> URLs, detect svg/png
//!  ├─ 3. Cache    same page list as last time? save cached bytes, done
//!  ├─ 4. Acquire  fetch + decode every page concurrently (timeout, retry)
//!  ├─ 5. Assemble embed pages in page order, one XObject per page
//!  └─ 6. Save     cache the bytes, hand `<name>.pdf` to the save target
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use score2pdf::{DirectorySaver, GenerationConfig, PageSource, PdfGenerator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = PdfGenerator::with_http(
//!         GenerationConfig::default(),
//!         Arc::new(DirectorySaver::new(".")),
//!     )?;
//!     let source = PageSource::new(vec![
//!         "https://cdn.example.com/score/1/score_0.svg".into(),
//!         "https://cdn.example.com/score/1/score_1.svg".into(),
//!     ])
//!     .with_sample("https://cdn.example.com/score/1/score_0.svg");
//!
//!     let doc = generator.generate(&source, "Prelude_in_C").await?;
//!     eprintln!("{} pages → {}", doc.page_count, doc.file_name);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `score2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod save;
pub mod score;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{fingerprint, DocumentCache};
pub use config::{GenerationConfig, GenerationConfigBuilder, PageSize};
pub use error::{PageError, Score2PdfError};
pub use format::{detect_format, ImageFormat};
pub use generate::{generate_sync, PdfGenerator};
pub use output::AssembledDocument;
pub use pipeline::acquire::{AcquiredPage, RasterPage, VectorPage};
pub use pipeline::fetch::{HttpPageLoader, PageLoader};
pub use progress::{
    GenerationProgressCallback, GenerationState, NoopProgressCallback, ProgressCallback,
};
pub use save::{DirectorySaver, SaveTarget};
pub use score::{derive_file_name, DownloadTarget, PageSource, ScoreInfo};
