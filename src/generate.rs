//! PDF generation entry points.
//!
//! [`PdfGenerator`] owns everything a request needs: configuration, the page
//! acquirer, the save target and the single-slot document cache. A request
//! walks `Detecting → Building → Serializing → Saved`, or jumps straight to
//! `Saved` when the same page list was assembled before.
//!
//! Concurrent requests on one generator run one at a time: the cache slot is
//! locked for the whole request, so a double click waits for the first run
//! and is then served from the cache.

use crate::cache::{fingerprint, CachedDocument, DocumentCache};
use crate::config::{GenerationConfig, PageSize};
use crate::error::Score2PdfError;
use crate::format::{detect_format, ImageFormat};
use crate::output::AssembledDocument;
use crate::pipeline::acquire::{AcquiredPage, Acquirer};
use crate::pipeline::assemble::PdfBuilder;
use crate::pipeline::fetch::{HttpPageLoader, PageLoader};
use crate::progress::GenerationState;
use crate::save::SaveTarget;
use crate::score::{PageSource, ScoreInfo};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Assembles score pages into a PDF and hands it to a save target.
pub struct PdfGenerator {
    config: GenerationConfig,
    acquirer: Acquirer,
    saver: Arc<dyn SaveTarget>,
    cache: Mutex<DocumentCache>,
}

impl PdfGenerator {
    /// Create a generator with a custom page loader.
    pub fn new(
        config: GenerationConfig,
        loader: Arc<dyn PageLoader>,
        saver: Arc<dyn SaveTarget>,
    ) -> Self {
        let acquirer = Acquirer::new(loader, &config);
        Self {
            config,
            acquirer,
            saver,
            cache: Mutex::new(DocumentCache::new()),
        }
    }

    /// Create a generator that fetches pages over HTTP or from disk.
    pub fn with_http(
        config: GenerationConfig,
        saver: Arc<dyn SaveTarget>,
    ) -> Result<Self, Score2PdfError> {
        let loader = HttpPageLoader::new(config.fetch_timeout_secs)
            .map_err(|e| Score2PdfError::Internal(e.to_string()))?;
        Ok(Self::new(config, Arc::new(loader), saver))
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Assemble `source` into a PDF saved as `<name>.pdf`.
    ///
    /// A page list that was already assembled is not rebuilt: the cached
    /// bytes are saved again under the new name. Any page failure aborts the
    /// request; nothing is cached or saved in that case.
    ///
    /// # Errors
    /// - [`Score2PdfError::NoPages`] for an empty source
    /// - [`Score2PdfError::PageLoadFailed`] for the first page that failed
    /// - [`Score2PdfError::Serialization`] if embedding failed
    /// - [`Score2PdfError::SaveFailed`] from the save target
    pub async fn generate(
        &self,
        source: &PageSource,
        name: &str,
    ) -> Result<AssembledDocument, Score2PdfError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_generation_start(source.len());
        }

        let result = self.run(source, name).await;

        if let Some(ref cb) = self.config.progress_callback {
            let from_cache = result.as_ref().map(|d| d.from_cache).unwrap_or(false);
            cb.on_generation_complete(result.is_ok(), from_cache);
        }
        if let Err(ref e) = result {
            warn!("Generation of '{}' failed: {}", name, e);
        }
        result
    }

    /// Generate the PDF for a score described by host state.
    ///
    /// Page URLs follow the score's asset layout; the file name is the
    /// derived title, or the score id when the title is empty.
    pub async fn generate_for_score(
        &self,
        score: &ScoreInfo,
    ) -> Result<AssembledDocument, Score2PdfError> {
        let source = score.page_source(self.config.format);
        self.generate(&source, &score.file_stem()).await
    }

    /// Forget the cached document.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    async fn run(&self, source: &PageSource, name: &str) -> Result<AssembledDocument, Score2PdfError> {
        let start = Instant::now();
        if source.is_empty() {
            return Err(Score2PdfError::NoPages);
        }

        let key = fingerprint(&source.urls);
        let file_name = format!("{name}.pdf");
        let mut cache = self.cache.lock().await;

        // ── Cache hit ────────────────────────────────────────────────────
        if let Some(hit) = cache.lookup(&key) {
            info!(
                "Reusing cached PDF ({} pages) for '{}'",
                hit.page_count, file_name
            );
            self.saver.save(&hit.bytes, &file_name)?;
            self.transition(GenerationState::Saved);
            return Ok(AssembledDocument {
                bytes: Arc::clone(&hit.bytes),
                file_name,
                page_count: hit.page_count,
                format: hit.format,
                from_cache: true,
                fingerprint: key,
                byte_len: hit.bytes.len(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        // ── Detect format ────────────────────────────────────────────────
        self.transition(GenerationState::Detecting);
        let format = match self.config.format {
            Some(format) => format,
            None => {
                let detected = detect_format(source.sample.as_deref());
                if detected.is_none() {
                    debug!("Page format undetermined, falling back to SVG");
                }
                ImageFormat::resolve(detected)
            }
        };
        info!("Assembling {} {} pages into '{}'", source.len(), format, file_name);

        // ── Acquire pages ────────────────────────────────────────────────
        self.transition(match format {
            ImageFormat::Svg => GenerationState::BuildingFromSvg,
            ImageFormat::Png => GenerationState::BuildingFromPng,
        });
        let acquire_start = Instant::now();
        let pages = self.acquire_all(source, format).await?;
        debug!(
            "Acquired {} pages in {}ms",
            pages.len(),
            acquire_start.elapsed().as_millis()
        );

        // ── Embed and serialise ──────────────────────────────────────────
        let size = page_size(&self.config, format, &pages);
        let compress = self.config.compress;
        let title = name.to_string();
        self.transition(GenerationState::Serializing);
        let bytes = tokio::task::spawn_blocking(move || assemble(&pages, size, compress, &title))
            .await
            .map_err(|e| Score2PdfError::Internal(format!("Assembly task panicked: {e}")))??;

        let bytes: Arc<[u8]> = Arc::from(bytes);
        cache.store(CachedDocument {
            fingerprint: key.clone(),
            bytes: Arc::clone(&bytes),
            page_count: source.len(),
            format,
        });

        self.saver.save(&bytes, &file_name)?;
        self.transition(GenerationState::Saved);

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Generated '{}': {} pages, {} bytes, {}ms",
            file_name,
            source.len(),
            bytes.len(),
            duration_ms
        );

        Ok(AssembledDocument {
            byte_len: bytes.len(),
            bytes,
            file_name,
            page_count: source.len(),
            format,
            from_cache: false,
            fingerprint: key,
            duration_ms,
        })
    }

    /// Acquire every page concurrently, returned in page-source order.
    async fn acquire_all(
        &self,
        source: &PageSource,
        format: ImageFormat,
    ) -> Result<Vec<AcquiredPage>, Score2PdfError> {
        let total = source.len();
        let limit = self.config.effective_concurrency(total);
        let acquirer = &self.acquirer;
        let progress = self.config.progress_callback.as_ref();

        let mut pages: Vec<(usize, AcquiredPage)> =
            stream::iter(source.urls.iter().enumerate().map(|(idx, url)| async move {
                let page_num = idx + 1;
                match acquirer.acquire(url, format).await {
                    Ok(page) => {
                        debug!("Page {}/{} acquired", page_num, total);
                        if let Some(cb) = progress {
                            cb.on_page_acquired(page_num, total);
                        }
                        Ok((idx, page))
                    }
                    Err(e) => {
                        if let Some(cb) = progress {
                            cb.on_page_error(page_num, total, &e.to_string());
                        }
                        Err(Score2PdfError::PageLoadFailed {
                            page: page_num,
                            source: e,
                        })
                    }
                }
            }))
            .buffer_unordered(limit)
            .try_collect()
            .await?;

        // Completion order is arbitrary; output order is not.
        pages.sort_by_key(|(idx, _)| *idx);
        Ok(pages.into_iter().map(|(_, page)| page).collect())
    }

    fn transition(&self, state: GenerationState) {
        debug!("Generation state → {}", state);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_state_change(state);
        }
    }
}

/// Page size for the document: configured, or the first raster page's
/// natural size on the PNG path.
fn page_size(config: &GenerationConfig, format: ImageFormat, pages: &[AcquiredPage]) -> PageSize {
    match format {
        ImageFormat::Svg => config.svg_page_size,
        ImageFormat::Png => config.png_page_size.unwrap_or_else(|| {
            pages
                .iter()
                .find_map(|page| match page {
                    AcquiredPage::Raster(r) => {
                        Some(PageSize::new(r.width as f32, r.height as f32))
                    }
                    AcquiredPage::Vector(_) => None,
                })
                .unwrap_or(PageSize::LETTER)
        }),
    }
}

/// Embed pages in order and serialise.
fn assemble(
    pages: &[AcquiredPage],
    size: PageSize,
    compress: bool,
    title: &str,
) -> Result<Vec<u8>, Score2PdfError> {
    let mut builder = PdfBuilder::new(compress);
    for page in pages {
        match page {
            AcquiredPage::Raster(raster) => builder.add_raster_page(raster, size)?,
            AcquiredPage::Vector(vector) => builder.add_vector_page(vector, size)?,
        }
    }
    builder.finish(title)
}

/// Synchronous wrapper around [`PdfGenerator::generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    generator: &PdfGenerator,
    source: &PageSource,
    name: &str,
) -> Result<AssembledDocument, Score2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Score2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generator.generate(source, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::pipeline::acquire::RasterPage;
    use crate::save::SaveTarget;
    use futures::future::BoxFuture;
    use image::RgbaImage;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves each URL after its own delay.
    struct DelayedLoader(HashMap<String, (u64, Vec<u8>)>);

    impl PageLoader for DelayedLoader {
        fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, PageError>> {
            Box::pin(async move {
                let (delay_ms, body) = self.0.get(url).ok_or_else(|| PageError::NotFound {
                    path: url.into(),
                })?;
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(body.clone())
            })
        }
    }

    struct DiscardSaver;

    impl SaveTarget for DiscardSaver {
        fn save(&self, _bytes: &[u8], _file_name: &str) -> Result<(), Score2PdfError> {
            Ok(())
        }
    }

    fn svg(width: u32) -> Vec<u8> {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="50">
                <rect width="10" height="10"/>
            </svg>"#
        )
        .into_bytes()
    }

    fn raster(w: u32, h: u32) -> AcquiredPage {
        AcquiredPage::Raster(RasterPage {
            width: w,
            height: h,
            pixels: RgbaImage::new(w, h),
        })
    }

    #[test]
    fn png_page_size_comes_from_first_page() {
        let config = GenerationConfig::default();
        let pages = [raster(1240, 1754), raster(10, 10)];
        assert_eq!(
            page_size(&config, ImageFormat::Png, &pages),
            PageSize::new(1240.0, 1754.0)
        );
    }

    #[test]
    fn configured_png_page_size_wins() {
        let config = GenerationConfig::builder()
            .png_page_size(PageSize::A4)
            .build()
            .unwrap();
        assert_eq!(
            page_size(&config, ImageFormat::Png, &[raster(1, 1)]),
            PageSize::A4
        );
    }

    #[test]
    fn svg_page_size_is_document_default() {
        let config = GenerationConfig::default();
        assert_eq!(page_size(&config, ImageFormat::Svg, &[]), PageSize::LETTER);
    }

    #[tokio::test]
    async fn svg_pages_keep_source_order() {
        // Page 1 resolves first, page 0 last.
        let loader = DelayedLoader(HashMap::from([
            ("v/score_0.svg".to_string(), (80, svg(100))),
            ("v/score_1.svg".to_string(), (0, svg(200))),
            ("v/score_2.svg".to_string(), (40, svg(300))),
        ]));
        let config = GenerationConfig::builder().system_fonts(false).build().unwrap();
        let generator = PdfGenerator::new(config, Arc::new(loader), Arc::new(DiscardSaver));
        let source = PageSource::new(vec![
            "v/score_0.svg".into(),
            "v/score_1.svg".into(),
            "v/score_2.svg".into(),
        ]);

        let pages = generator.acquire_all(&source, ImageFormat::Svg).await.unwrap();
        let widths: Vec<f32> = pages
            .iter()
            .map(|page| match page {
                AcquiredPage::Vector(v) => v.size().0,
                AcquiredPage::Raster(_) => panic!("expected a vector page"),
            })
            .collect();
        assert_eq!(widths, vec![100.0, 200.0, 300.0]);

        let doc = generator.generate(&source, "Vector").await.unwrap();
        assert_eq!(doc.page_count, 3);
    }

    #[test]
    fn assemble_keeps_page_count() {
        let pages = [raster(4, 4), raster(4, 4), raster(4, 4)];
        let bytes = assemble(&pages, PageSize::new(4.0, 4.0), true, "t").unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }
}
