//! Configuration types for PDF generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks and logged as a whole.

use crate::error::Score2PdfError;
use crate::format::ImageFormat;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Retries per page accepted by the builder; larger values are clamped.
pub const MAX_RETRIES: u32 = 10;

/// Configuration for assembling a score PDF.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use score2pdf::{GenerationConfig, ImageFormat};
///
/// let config = GenerationConfig::builder()
///     .concurrency(8)
///     .fetch_timeout_secs(20)
///     .format(ImageFormat::Png)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Force the page format instead of detecting it from the sample URL.
    pub format: Option<ImageFormat>,

    /// Maximum number of page fetches in flight. Default: `None` (unbounded).
    ///
    /// Every page request starts immediately when unset. Set a bound for
    /// hosts that throttle parallel downloads.
    pub concurrency: Option<usize>,

    /// Per-page fetch timeout in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Retry attempts for a transient fetch failure. Default: 0, at most
    /// [`MAX_RETRIES`] through the builder.
    ///
    /// Only timeouts, connection errors and HTTP 5xx/429 are retried.
    /// Undecodable pages fail immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt and capped at
    /// 30 s. Default: 500.
    pub retry_backoff_ms: u64,

    /// Page size in points for SVG documents. Default: US Letter.
    pub svg_page_size: PageSize,

    /// Page size in points for PNG documents.
    ///
    /// `None` (default) uses the first page's natural pixel dimensions,
    /// one point per pixel.
    pub png_page_size: Option<PageSize>,

    /// Load system fonts so text in SVG pages can be converted. Default: true.
    pub system_fonts: bool,

    /// Compress content and image streams. Default: true.
    pub compress: bool,

    /// Optional progress callback ("Processing…" label and per-page events).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            format: None,
            concurrency: None,
            fetch_timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
            svg_page_size: PageSize::LETTER,
            png_page_size: None,
            system_fonts: true,
            compress: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("format", &self.format)
            .field("concurrency", &self.concurrency)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("svg_page_size", &self.svg_page_size)
            .field("png_page_size", &self.png_page_size)
            .field("system_fonts", &self.system_fonts)
            .field("compress", &self.compress)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Number of acquisitions allowed in flight for `total` pages.
    pub fn effective_concurrency(&self, total: usize) -> usize {
        self.concurrency.unwrap_or(total).clamp(1, total.max(1))
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.config.format = Some(format);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n.max(1));
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn svg_page_size(mut self, size: PageSize) -> Self {
        self.config.svg_page_size = size;
        self
    }

    pub fn png_page_size(mut self, size: PageSize) -> Self {
        self.config.png_page_size = Some(size);
        self
    }

    pub fn system_fonts(mut self, v: bool) -> Self {
        self.config.system_fonts = v;
        self
    }

    pub fn compress(mut self, v: bool) -> Self {
        self.config.compress = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<GenerationConfig, Score2PdfError> {
        self.config.max_retries = self.config.max_retries.min(MAX_RETRIES);
        let c = &self.config;
        if c.fetch_timeout_secs == 0 {
            return Err(Score2PdfError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        c.svg_page_size.validate()?;
        if let Some(size) = c.png_page_size {
            size.validate()?;
        }
        Ok(self.config)
    }
}

// ── Page size ────────────────────────────────────────────────────────────

/// A page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter, 8.5 × 11 in.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    /// ISO A4, 210 × 297 mm.
    pub const A4: PageSize = PageSize {
        width: 595.28,
        height: 841.89,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Parse `letter`, `a4` or `<width>x<height>` in points.
    pub fn parse(s: &str) -> Result<Self, Score2PdfError> {
        let s = s.trim().to_ascii_lowercase();
        let size = match s.as_str() {
            "letter" => Self::LETTER,
            "a4" => Self::A4,
            other => {
                let (w, h) = other.split_once('x').ok_or_else(|| {
                    Score2PdfError::InvalidConfig(format!(
                        "Page size must be 'letter', 'a4' or WIDTHxHEIGHT, got '{other}'"
                    ))
                })?;
                let parse = |v: &str| {
                    v.trim().parse::<f32>().map_err(|_| {
                        Score2PdfError::InvalidConfig(format!("Invalid page dimension '{v}'"))
                    })
                };
                Self::new(parse(w)?, parse(h)?)
            }
        };
        size.validate()?;
        Ok(size)
    }

    fn validate(&self) -> Result<(), Score2PdfError> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if !ok(self.width) || !ok(self.height) {
            return Err(Score2PdfError::InvalidConfig(format!(
                "Page size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_unbounded_single_attempt() {
        let c = GenerationConfig::default();
        assert_eq!(c.concurrency, None);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.svg_page_size, PageSize::LETTER);
        assert!(c.png_page_size.is_none());
    }

    #[test]
    fn effective_concurrency() {
        let c = GenerationConfig::default();
        assert_eq!(c.effective_concurrency(12), 12);
        assert_eq!(c.effective_concurrency(0), 1);

        let c = GenerationConfig::builder().concurrency(4).build().unwrap();
        assert_eq!(c.effective_concurrency(12), 4);
        assert_eq!(c.effective_concurrency(2), 2);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = GenerationConfig::builder()
            .fetch_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Score2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = GenerationConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, Some(1));
    }

    #[test]
    fn builder_clamps_retries() {
        let c = GenerationConfig::builder().max_retries(70).build().unwrap();
        assert_eq!(c.max_retries, MAX_RETRIES);
        let c = GenerationConfig::builder().max_retries(3).build().unwrap();
        assert_eq!(c.max_retries, 3);
    }

    #[test]
    fn page_size_parse() {
        assert_eq!(PageSize::parse("Letter").unwrap(), PageSize::LETTER);
        assert_eq!(PageSize::parse("a4").unwrap(), PageSize::A4);
        assert_eq!(
            PageSize::parse("1240x1754").unwrap(),
            PageSize::new(1240.0, 1754.0)
        );
        assert!(PageSize::parse("wide").is_err());
        assert!(PageSize::parse("0x100").is_err());
        assert!(PageSize::parse("12xabc").is_err());
    }
}
