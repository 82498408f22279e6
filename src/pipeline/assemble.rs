//! Document assembly: embed acquired pages into one PDF.
//!
//! Every page is a single XObject stretched over the full media box, with no
//! margins. Raster pages become image XObjects (RGB plus an optional soft
//! mask for transparency); vector pages become form XObjects produced by
//! `svg2pdf`. Both are placed in a unit square by their producer, so one
//! content stream shape (`q W 0 0 H 0 0 cm /P0 Do Q`) serves both.
//!
//! Pages are appended in call order; the caller is responsible for handing
//! them over in page-source order.

use crate::config::PageSize;
use crate::error::Score2PdfError;
use crate::pipeline::acquire::{RasterPage, VectorPage};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, TextStr};
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

const PAGE_XOBJECT: Name<'static> = Name(b"P0");
const PRODUCER: &str = concat!("score2pdf ", env!("CARGO_PKG_VERSION"));

/// Incrementally built multi-page PDF.
pub struct PdfBuilder {
    pdf: Pdf,
    alloc: Ref,
    catalog_id: Ref,
    page_tree_id: Ref,
    page_ids: Vec<Ref>,
    compress: bool,
}

impl PdfBuilder {
    pub fn new(compress: bool) -> Self {
        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let page_tree_id = alloc.bump();
        Self {
            pdf: Pdf::new(),
            alloc,
            catalog_id,
            page_tree_id,
            page_ids: Vec::new(),
            compress,
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append a raster page stretched to `size`.
    pub fn add_raster_page(&mut self, page: &RasterPage, size: PageSize) -> Result<(), Score2PdfError> {
        let mut rgb = Vec::with_capacity(page.pixels.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(page.pixels.len() / 4);
        let mut opaque = true;
        for px in page.pixels.pixels() {
            let [r, g, b, a] = px.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
            opaque &= a == u8::MAX;
        }

        let image_id = self.alloc.bump();
        let mask_id = if opaque { None } else { Some(self.alloc.bump()) };

        let (data, filter) = encode_stream(&rgb, self.compress)?;
        let mut image = self.pdf.image_xobject(image_id, &data);
        if let Some(filter) = filter {
            image.filter(filter);
        }
        image.width(page.width as i32);
        image.height(page.height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        if let Some(mask_id) = mask_id {
            image.s_mask(mask_id);
        }
        image.finish();

        if let Some(mask_id) = mask_id {
            let (data, filter) = encode_stream(&alpha, self.compress)?;
            let mut mask = self.pdf.image_xobject(mask_id, &data);
            if let Some(filter) = filter {
                mask.filter(filter);
            }
            mask.width(page.width as i32);
            mask.height(page.height as i32);
            mask.color_space().device_gray();
            mask.bits_per_component(8);
            mask.finish();
        }

        debug!(
            "Embedded raster page {} ({}x{} px, mask: {})",
            self.page_ids.len() + 1,
            page.width,
            page.height,
            !opaque
        );
        self.push_page(image_id, size)
    }

    /// Append a vector page stretched to `size` (aspect ratio not preserved).
    pub fn add_vector_page(&mut self, page: &VectorPage, size: PageSize) -> Result<(), Score2PdfError> {
        let mut options = svg2pdf::ConversionOptions::default();
        options.compress = self.compress;

        let (chunk, svg_id) = svg2pdf::to_chunk(&page.tree, options)
            .map_err(|e| Score2PdfError::Serialization(format!("SVG conversion failed: {e}")))?;

        // The chunk numbers its objects from 1; move them past ours.
        let mut map = HashMap::new();
        let alloc = &mut self.alloc;
        let chunk = chunk.renumber(|old| *map.entry(old).or_insert_with(|| alloc.bump()));
        let svg_id = *map.get(&svg_id).ok_or_else(|| {
            Score2PdfError::Serialization("SVG conversion lost its root object".into())
        })?;
        self.pdf.extend(&chunk);

        let (w, h) = page.size();
        debug!(
            "Embedded vector page {} ({}x{} units)",
            self.page_ids.len() + 1,
            w,
            h
        );
        self.push_page(svg_id, size)
    }

    fn push_page(&mut self, xobject: Ref, size: PageSize) -> Result<(), Score2PdfError> {
        let page_id = self.alloc.bump();
        let content_id = self.alloc.bump();

        let mut content = Content::new();
        content.save_state();
        content.transform([size.width, 0.0, 0.0, size.height, 0.0, 0.0]);
        content.x_object(PAGE_XOBJECT);
        content.restore_state();
        let content = content.finish();

        let (data, filter) = encode_stream(&content, self.compress)?;
        let mut stream = self.pdf.stream(content_id, &data);
        if let Some(filter) = filter {
            stream.filter(filter);
        }
        stream.finish();

        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, size.width, size.height));
        page.parent(self.page_tree_id);
        page.contents(content_id);
        page.resources().x_objects().pair(PAGE_XOBJECT, xobject);
        page.finish();

        self.page_ids.push(page_id);
        Ok(())
    }

    /// Write the page tree and document info, and serialise.
    pub fn finish(mut self, title: &str) -> Result<Vec<u8>, Score2PdfError> {
        if self.page_ids.is_empty() {
            return Err(Score2PdfError::NoPages);
        }

        self.pdf.catalog(self.catalog_id).pages(self.page_tree_id);
        self.pdf
            .pages(self.page_tree_id)
            .kids(self.page_ids.iter().copied())
            .count(self.page_ids.len() as i32);

        let info_id = self.alloc.bump();
        let mut info = self.pdf.document_info(info_id);
        if !title.is_empty() {
            info.title(TextStr(title));
        }
        info.producer(TextStr(PRODUCER));
        info.finish();

        Ok(self.pdf.finish())
    }
}

/// Deflate `data` when compression is on.
fn encode_stream(data: &[u8], compress: bool) -> Result<(Vec<u8>, Option<Filter>), Score2PdfError> {
    if !compress {
        return Ok((data.to_vec(), None));
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map(|deflated| (deflated, Some(Filter::FlateDecode)))
        .map_err(|e| Score2PdfError::Serialization(format!("stream compression failed: {e}")))
}
