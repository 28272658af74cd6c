use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};
use tracing::debug;
use webp::Encoder as WebpEncoder;

use crate::error::{Error, Result};
use crate::geometry::{CoordinateMapper, Size, raster_size};
use super::document::PdfDocument;

/// Default scale factor for the editing raster (2.0 for high DPI)
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Default scale factor for navigation thumbnails
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.3;

/// A page rasterized for display.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Zero-based page number
    pub page_num: usize,
    /// The raster, origin top-left
    pub image: RgbaImage,
    /// Page size in points
    pub pdf_size: Size,
}

impl RenderedPage {
    /// Raster size in pixels.
    pub fn display_size(&self) -> Size {
        Size::new(f64::from(self.image.width()), f64::from(self.image.height()))
    }

    /// Mapper between this raster and the page's point space.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.display_size(), self.pdf_size)
    }
}

/// A small PNG preview of one page.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub page_num: usize,
    /// Navigation label ("P1", "P2", ...)
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Page renderer for PDF documents
pub struct PageRenderer<'a> {
    /// The PDF document to render
    pub doc: &'a PdfDocument,
    /// Scale factor for rendering
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    /// Create a renderer with default scale (2.0)
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    /// Create a renderer with custom scale
    pub const fn with_scale(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Raster size [`render_page`](Self::render_page) produces at the
    /// current scale, without rendering.
    pub fn display_size(&self, page_num: usize) -> Result<Size> {
        Ok(raster_size(self.doc.page_size(page_num)?, f64::from(self.scale)))
    }

    /// Render a page to an RGBA image buffer
    pub fn render_page(&self, page_num: usize) -> Result<RenderedPage> {
        let page_index = self.doc.page(page_num)?;
        let pdf_size = self.doc.page_size(page_num)?;

        let doc = self.doc.open_document()?;
        let page = doc.load_page(page_index.mupdf()).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;

        let matrix = Matrix::new_scale(self.scale, self.scale);

        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| Error::PdfRender {
                page: page_num,
                reason: format!("Failed to render: {e}"),
            })?;

        let pixels = pixmap.samples();
        let img_width = pixmap.width();
        let img_height = pixmap.height();

        let n = pixmap.n() as usize; // components per pixel
        let mut rgba_pixels = Vec::with_capacity(img_width as usize * img_height as usize * 4);

        for chunk in pixels.chunks(n) {
            match n {
                3 => {
                    rgba_pixels.extend_from_slice(chunk);
                    rgba_pixels.push(255);
                }
                4 => rgba_pixels.extend_from_slice(chunk),
                1 => {
                    rgba_pixels.extend_from_slice(&[chunk[0], chunk[0], chunk[0], 255]);
                }
                _ => {
                    return Err(Error::PdfRender {
                        page: page_num,
                        reason: format!("Unexpected pixel format with {n} components"),
                    });
                }
            }
        }

        let image = RgbaImage::from_raw(img_width, img_height, rgba_pixels).ok_or_else(|| {
            Error::PdfRender {
                page: page_num,
                reason: "Failed to create image buffer".to_string(),
            }
        })?;

        debug!(
            "Rendered page {} at {}x: {}x{} px",
            page_num,
            self.scale,
            image.width(),
            image.height()
        );

        Ok(RenderedPage {
            page_num,
            image,
            pdf_size,
        })
    }

    /// Render a page to PNG bytes
    pub fn render_page_png(&self, page_num: usize) -> Result<Vec<u8>> {
        let rendered = self.render_page(page_num)?;
        encode_png(&rendered.image).map_err(|reason| Error::PdfRender {
            page: page_num,
            reason,
        })
    }

    /// Render a page to WebP bytes (lossy, quality 85)
    pub fn render_page_webp(&self, page_num: usize) -> Result<Vec<u8>> {
        let rendered = self.render_page(page_num)?;
        let img = &rendered.image;

        let encoder = WebpEncoder::from_rgba(img.as_raw(), img.width(), img.height());
        Ok(encoder.encode(85.0).to_vec())
    }

    /// PNG thumbnails of every page, in page order.
    pub fn thumbnails(&self) -> Result<Vec<Thumbnail>> {
        (0..self.doc.page_count())
            .map(|page_num| {
                let rendered = self.render_page(page_num)?;
                let png = encode_png(&rendered.image).map_err(|reason| Error::PdfRender {
                    page: page_num,
                    reason,
                })?;
                Ok(Thumbnail {
                    page_num,
                    label: self.doc.page(page_num)?.label(),
                    width: rendered.image.width(),
                    height: rendered.image.height(),
                    png,
                })
            })
            .collect()
    }
}

fn encode_png(img: &RgbaImage) -> std::result::Result<Vec<u8>, String> {
    let mut png_data = Vec::new();
    // Fast compression is still lossless
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        &mut png_data,
        image::codecs::png::CompressionType::Fast,
        image::codecs::png::FilterType::Adaptive,
    );

    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| format!("Failed to encode PNG: {e}"))?;

    Ok(png_data)
}
