//! Burn saved text boxes and the signature into a copy of the document.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SignaturePage, TextColor};
use crate::error::{Error, Result};
use crate::geometry::{CoordinateMapper, Point, Size, fit_preserving_aspect, image_origin_y, text_origin_y};
use crate::pdf::merge::merge_overlay_page;
use crate::pdf::resources::media_box;
use crate::pdf::{FontBook, OverlayCanvas, PageRenderer, PdfDocument, SignatureImage};
use crate::scene::inset_bottom_right;
use crate::store::{OverlayMap, TextBoxRecord};

/// Progress callback: `(pages done, total pages)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send>;

/// The signature as placed in the editor.
#[derive(Debug, Clone)]
pub struct SignatureStamp {
    pub image: SignatureImage,
    /// Top-left corner in raster pixels
    pub position: Point,
    /// Raster pixels per image pixel
    pub scale: f64,
}

impl SignatureStamp {
    pub const fn new(image: SignatureImage, position: Point, scale: f64) -> Self {
        Self {
            image,
            position,
            scale,
        }
    }

    /// Displayed size in raster pixels.
    pub fn raster_size(&self) -> Size {
        self.image.size().scaled(self.scale)
    }
}

/// Where the signature sits when it was never moved: the bottom-right
/// corner of `page`'s raster, inset by the configured margin.
pub fn default_signature_position(
    document: &PdfDocument,
    config: &AppConfig,
    page: usize,
    image: &SignatureImage,
) -> Result<Point> {
    let display = PageRenderer::with_scale(document, config.render_scale).display_size(page)?;
    let size = image.size().scaled(config.signature.scale);
    Ok(inset_bottom_right(display, size, config.signature.margin))
}

/// What a flatten run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub pages: usize,
    /// Pages that received an overlay, zero-based
    pub pages_changed: Vec<usize>,
    pub text_drawn: usize,
    pub text_skipped: usize,
    pub signature_drawn: bool,
}

/// Draws overlays onto every page of a document.
pub struct Flattener {
    fonts: FontBook,
    default_family: String,
    text_color: TextColor,
    signature_page: SignaturePage,
    render_scale: f64,
}

impl Flattener {
    /// Flattener with standard fonts, black text and the signature on the last page.
    pub fn new(fonts: FontBook) -> Self {
        Self {
            fonts,
            default_family: crate::store::DEFAULT_FONT_FAMILY.to_string(),
            text_color: TextColor::black(),
            signature_page: SignaturePage::Last,
            render_scale: f64::from(crate::pdf::DEFAULT_RENDER_SCALE),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(FontBook::from_config(&config.fonts))
            .with_default_family(&config.fonts.default_family)
            .with_text_color(config.text_color)
            .with_signature_page(config.signature.page)
            .with_render_scale(f64::from(config.render_scale))
    }

    #[must_use]
    pub fn with_default_family(mut self, family: &str) -> Self {
        self.default_family = family.to_string();
        self
    }

    #[must_use]
    pub const fn with_text_color(mut self, color: TextColor) -> Self {
        self.text_color = color;
        self
    }

    #[must_use]
    pub const fn with_signature_page(mut self, page: SignaturePage) -> Self {
        self.signature_page = page;
        self
    }

    /// Scale the signature position was measured at.
    #[must_use]
    pub const fn with_render_scale(mut self, scale: f64) -> Self {
        self.render_scale = scale;
        self
    }

    /// Flatten into PDF bytes. Page count, order and sizes are preserved;
    /// pages with nothing to draw are left as they are.
    pub fn flatten(
        &self,
        source: &PdfDocument,
        overlays: &OverlayMap,
        signature: Option<&SignatureStamp>,
        progress: Option<ProgressCallback>,
    ) -> Result<(Vec<u8>, FlattenReport)> {
        let mut doc = Document::load_mem(source.bytes())
            .map_err(|e| Error::PdfOpen(format!("Failed to load PDF: {e}")))?;

        let pages = doc.get_pages();
        let total = pages.len();
        let signature_page = signature.and(self.signature_page.resolve(total));
        let mut report = FlattenReport {
            pages: total,
            ..FlattenReport::default()
        };

        for (&number, &page_id) in &pages {
            let page_num = (number as usize).saturating_sub(1);
            let page_size = media_box(&doc, page_id)?.size();

            let mut canvas = OverlayCanvas::new(page_size, self.fonts.clone());
            canvas.set_fill_color(self.text_color);

            if let Some(set) = overlays.get(&page_num) {
                for (i, record) in set.text_boxes.iter().enumerate() {
                    match self.draw_record(&mut canvas, record, page_size.height) {
                        Ok(true) => report.text_drawn += 1,
                        Ok(false) => debug!("Page {}: text box {} is empty", page_num, i),
                        Err(e) => {
                            warn!("Page {}: skipping text box {}: {}", page_num, i, e);
                            report.text_skipped += 1;
                        }
                    }
                }
            }

            if signature_page == Some(page_num)
                && let Some(stamp) = signature
            {
                match self.draw_signature(&mut canvas, stamp, page_size) {
                    Ok(()) => report.signature_drawn = true,
                    Err(e) => warn!("Page {}: skipping signature: {}", page_num, e),
                }
            }

            if !canvas.is_empty() {
                merge_overlay_page(&mut doc, page_id, page_num, canvas.finish()?)?;
                report.pages_changed.push(page_num);
            }

            if let Some(ref callback) = progress {
                callback(page_num + 1, total);
            }
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;

        Ok((output, report))
    }

    /// Flatten and write the result to `output`, which must not be the source file.
    pub fn flatten_to_file(
        &self,
        source: &PdfDocument,
        overlays: &OverlayMap,
        signature: Option<&SignatureStamp>,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<FlattenReport> {
        if let Some(src) = source.path()
            && crate::util::same_file(src, output)
        {
            return Err(Error::OutputIsSource(output.to_path_buf()));
        }

        let (bytes, report) = self.flatten(source, overlays, signature, progress)?;
        crate::util::write_bytes_atomic(output, &bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to write {}: {e}", output.display())))?;

        info!(
            "Saved {} ({} pages, {} changed, {} text boxes, signature: {})",
            output.display(),
            report.pages,
            report.pages_changed.len(),
            report.text_drawn,
            report.signature_drawn
        );
        Ok(report)
    }

    /// Draw one text box. `Ok(false)` when it has no visible text.
    fn draw_record(&self, canvas: &mut OverlayCanvas, record: &TextBoxRecord, page_height: f64) -> Result<bool> {
        if record.text.trim().is_empty() {
            return Ok(false);
        }

        let size = f64::from(record.font_size);
        if let Err(e) = canvas.set_font(&record.font_family, size) {
            warn!("{}, falling back to {}", e, self.default_family);
            canvas.set_font(&self.default_family, size)?;
        }

        let y = text_origin_y(page_height, record.pdf_y, size);
        canvas.draw_string(record.pdf_x, y, &record.text)?;
        Ok(true)
    }

    fn draw_signature(&self, canvas: &mut OverlayCanvas, stamp: &SignatureStamp, page_size: Size) -> Result<()> {
        let mapper = CoordinateMapper::for_render_scale(page_size, self.render_scale);
        let origin = mapper.to_pdf(stamp.position);
        let bounds = mapper.size_to_pdf(stamp.raster_size());
        let y = image_origin_y(page_size.height, origin.y, bounds.height);

        let (x, y, width, height) = fit_preserving_aspect(
            origin.x,
            y,
            bounds,
            f64::from(stamp.image.width()),
            f64::from(stamp.image.height()),
        );
        debug!("Signature at ({x:.1}, {y:.1}) size {width:.1}x{height:.1} pt");
        canvas.draw_image(&stamp.image, x, y, width, height)
    }
}
