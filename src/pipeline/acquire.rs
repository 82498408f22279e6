//! Page acquisition: fetch one page and decode it for embedding.
//!
//! PNG pages become an RGBA bitmap with their natural pixel size; SVG pages
//! become a parsed `usvg` tree. Decoding is CPU-bound, so it runs inside
//! `spawn_blocking` and never stalls the async workers that keep the other
//! page fetches moving.
//!
//! ## Retry Strategy
//!
//! Only the fetch is retried, and only for transient failures (timeouts,
//! connection errors, HTTP 5xx / 429). The wait doubles each attempt
//! (`retry_backoff_ms * 2^(attempt-1)`). A page that downloads fine but does
//! not decode is reported at once: fetching the same bytes again cannot help.

use crate::config::GenerationConfig;
use crate::error::PageError;
use crate::format::ImageFormat;
use crate::pipeline::fetch::PageLoader;
use image::RgbaImage;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};
use usvg::fontdb;

/// Upper bound on a single retry delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// A decoded raster page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

/// A parsed vector page.
#[derive(Debug)]
pub struct VectorPage {
    pub tree: usvg::Tree,
}

impl VectorPage {
    /// Intrinsic size of the drawing in SVG user units.
    pub fn size(&self) -> (f32, f32) {
        let size = self.tree.size();
        (size.width(), size.height())
    }
}

/// One page, ready for the assembler.
#[derive(Debug)]
pub enum AcquiredPage {
    Raster(RasterPage),
    Vector(VectorPage),
}

/// Fetches and decodes pages with the configured timeout and retries.
#[derive(Clone)]
pub struct Acquirer {
    loader: Arc<dyn PageLoader>,
    fonts: Arc<OnceCell<Arc<fontdb::Database>>>,
    system_fonts: bool,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl Acquirer {
    pub fn new(loader: Arc<dyn PageLoader>, config: &GenerationConfig) -> Self {
        Self {
            loader,
            fonts: Arc::new(OnceCell::new()),
            system_fonts: config.system_fonts,
            timeout_secs: config.fetch_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Fetch `url` and decode it as `format`.
    pub async fn acquire(&self, url: &str, format: ImageFormat) -> Result<AcquiredPage, PageError> {
        let bytes = self.fetch(url).await?;
        let owned_url = url.to_string();

        match format {
            ImageFormat::Png => {
                tokio::task::spawn_blocking(move || decode_png(&owned_url, &bytes))
                    .await
                    .map_err(|e| decode_panicked(url, e))?
                    .map(AcquiredPage::Raster)
            }
            ImageFormat::Svg => {
                let fonts = Arc::clone(&self.fonts);
                let system_fonts = self.system_fonts;
                tokio::task::spawn_blocking(move || {
                    let fontdb = fonts.get_or_init(|| load_fonts(system_fonts));
                    parse_svg(&owned_url, &bytes, Arc::clone(fontdb))
                })
                .await
                .map_err(|e| decode_panicked(url, e))?
                .map(AcquiredPage::Vector)
            }
        }
    }

    /// Fetch with timeout and retry on transient failures.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PageError> {
        let limit = Duration::from_secs(self.timeout_secs);
        let mut last_err: Option<PageError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    url, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let err = match timeout(limit, self.loader.load(url)).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) => e,
                Err(_) => PageError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                },
            };

            if !err.is_transient() {
                return Err(err);
            }
            warn!("{}: attempt {} failed — {}", url, attempt + 1, err);
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| PageError::FetchFailed {
            url: url.to_string(),
            reason: "no fetch attempted".into(),
            transient: false,
        }))
    }
}

/// Decode PNG bytes into an RGBA bitmap.
pub fn decode_png(url: &str, bytes: &[u8]) -> Result<RasterPage, PageError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png).map_err(|e| {
        PageError::DecodeFailed {
            url: url.to_string(),
            detail: e.to_string(),
        }
    })?;
    let pixels = image.to_rgba8();
    let (width, height) = pixels.dimensions();
    debug!("Decoded {} → {}x{} px", url, width, height);
    Ok(RasterPage {
        width,
        height,
        pixels,
    })
}

/// Parse SVG bytes into a render tree.
pub fn parse_svg(
    url: &str,
    bytes: &[u8],
    fontdb: Arc<fontdb::Database>,
) -> Result<VectorPage, PageError> {
    let mut options = usvg::Options::default();
    options.fontdb = fontdb;

    let tree = usvg::Tree::from_data(bytes, &options).map_err(|e| PageError::DecodeFailed {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(PageError::DecodeFailed {
            url: url.to_string(),
            detail: format!("invalid SVG dimensions {}x{}", size.width(), size.height()),
        });
    }

    debug!("Parsed {} → {}x{} units", url, size.width(), size.height());
    Ok(VectorPage { tree })
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

fn load_fonts(system_fonts: bool) -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    if system_fonts {
        db.load_system_fonts();
        debug!("Loaded {} system font faces", db.len());
    }
    Arc::new(db)
}

fn decode_panicked(url: &str, e: tokio::task::JoinError) -> PageError {
    PageError::DecodeFailed {
        url: url.to_string(),
        detail: format!("decode task panicked: {e}"),
    }
}
