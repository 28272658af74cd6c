//! A one-page drawing surface for overlay content.
//!
//! Coordinates are PDF points with a bottom-left origin. The canvas is
//! turned into a single-page lopdf document that [`super::merge`] lays
//! over a page of the source document.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use tracing::{debug, warn};

use crate::config::TextColor;
use crate::error::{Error, Result};
use crate::geometry::Size;
use super::font::{FontBook, ResolvedFont, encode_win_ansi};
use super::signature::SignatureImage;

/// Line spacing for multi-line text, as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// A font registered on the canvas under a resource name.
struct FontSlot {
    name: String,
    font: ResolvedFont,
    /// Every character drawn with this font, for TrueType subsetting tables
    used: String,
}

/// Font state set by [`OverlayCanvas::set_font`].
#[derive(Clone)]
struct CurrentFont {
    key: String,
    size: f64,
}

/// Single-page canvas that collects text and image drawing calls.
pub struct OverlayCanvas {
    size: Size,
    fonts: FontBook,
    content: String,
    font_slots: BTreeMap<String, FontSlot>,
    images: Vec<(String, SignatureImage)>,
    current_font: Option<CurrentFont>,
    fill: TextColor,
    drawn: usize,
}

/// Format a coordinate for a content stream: at most 4 decimals, no trailing zeros.
fn num(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

impl OverlayCanvas {
    /// Empty canvas of `size` points.
    pub fn new(size: Size, fonts: FontBook) -> Self {
        Self {
            size,
            fonts,
            content: String::new(),
            font_slots: BTreeMap::new(),
            images: Vec::new(),
            current_font: None,
            fill: TextColor::black(),
            drawn: 0,
        }
    }

    pub const fn size(&self) -> Size {
        self.size
    }

    /// Select the font for following [`draw_string`](Self::draw_string) calls.
    ///
    /// On failure the previous font stays selected.
    pub fn set_font(&mut self, family: &str, size: f64) -> Result<()> {
        if !(size.is_finite() && size > 0.0) {
            return Err(Error::Canvas(format!("invalid font size {size}")));
        }
        let font = self.fonts.resolve(family)?;
        let key = font.key().to_string();

        if !self.font_slots.contains_key(&key) {
            let name = format!("F{}", self.font_slots.len() + 1);
            self.font_slots.insert(
                key.clone(),
                FontSlot {
                    name,
                    font,
                    used: String::new(),
                },
            );
        }

        self.current_font = Some(CurrentFont { key, size });
        Ok(())
    }

    pub fn set_fill_color(&mut self, color: TextColor) {
        self.fill = color;
    }

    /// Draw `text` with its first line's origin at `(x, y)`.
    /// Further lines (split on `\n`) go below at 1.2x the font size.
    pub fn draw_string(&mut self, x: f64, y: f64, text: &str) -> Result<()> {
        let current = self
            .current_font
            .clone()
            .ok_or_else(|| Error::Canvas("no font selected".to_string()))?;
        let slot = self
            .font_slots
            .get_mut(&current.key)
            .ok_or_else(|| Error::Canvas(format!("font {} not registered", current.key)))?;

        let mut ops = String::new();
        let TextColor { r, g, b } = self.fill;
        let _ = writeln!(ops, "q\n{} {} {} rg\nBT\n0 Tr", num(f64::from(r)), num(f64::from(g)), num(f64::from(b)));
        let _ = writeln!(ops, "/{} {} Tf", slot.name, num(current.size));

        for (i, line) in text.split('\n').enumerate() {
            let line = line.trim_end_matches('\r');
            let hex = match &slot.font {
                ResolvedFont::Standard(name) => {
                    let (bytes, replaced) = encode_win_ansi(line);
                    if replaced > 0 {
                        warn!("{} characters of {:?} cannot be drawn with {}", replaced, line, name);
                    }
                    bytes.iter().fold(String::new(), |mut acc, b| {
                        let _ = write!(acc, "{b:02X}");
                        acc
                    })
                }
                ResolvedFont::TrueType(font) => {
                    slot.used.push_str(line);
                    font.to_hex_glyphs(line)?
                }
            };

            #[allow(clippy::cast_precision_loss)]
            let line_y = y - i as f64 * current.size * LINE_HEIGHT_FACTOR;
            if i == 0 {
                let _ = writeln!(ops, "{} {} Td", num(x), num(line_y));
            } else {
                let _ = writeln!(ops, "0 {} Td", num(-current.size * LINE_HEIGHT_FACTOR));
            }
            let _ = writeln!(ops, "<{hex}> Tj");
        }
        ops.push_str("ET\nQ\n");

        self.content.push_str(&ops);
        self.drawn += 1;
        Ok(())
    }

    /// Draw `image` stretched to the rectangle `(x, y, width, height)`,
    /// `(x, y)` being its lower-left corner.
    pub fn draw_image(&mut self, image: &SignatureImage, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::Canvas(format!("invalid image size {width}x{height}")));
        }
        let name = format!("Im{}", self.images.len() + 1);
        let _ = writeln!(
            self.content,
            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ",
            num(width),
            num(height),
            num(x),
            num(y),
            name
        );
        self.images.push((name, image.clone()));
        self.drawn += 1;
        Ok(())
    }

    /// Whether no drawing call has succeeded yet.
    pub const fn is_empty(&self) -> bool {
        self.drawn == 0
    }

    /// Number of successful drawing calls.
    pub const fn drawn(&self) -> usize {
        self.drawn
    }

    /// Build the single-page document holding everything drawn.
    pub fn finish(self) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font_dict = Dictionary::new();
        for slot in self.font_slots.values() {
            let font_id = match &slot.font {
                ResolvedFont::Standard(name) => doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => *name,
                    "Encoding" => "WinAnsiEncoding",
                }),
                ResolvedFont::TrueType(font) => font.embed(&mut doc, &slot.used)?,
            };
            font_dict.set(slot.name.as_str(), font_id);
        }

        let mut xobject_dict = Dictionary::new();
        for (name, image) in &self.images {
            let image_id = image.embed(&mut doc);
            xobject_dict.set(name.as_str(), image_id);
        }

        let mut resources = Dictionary::new();
        if !font_dict.is_empty() {
            resources.set("Font", font_dict);
        }
        if !xobject_dict.is_empty() {
            resources.set("XObject", xobject_dict);
        }

        let content_id = doc.add_object(Stream::new(Dictionary::new(), self.content.into_bytes()));

        #[allow(clippy::cast_possible_truncation)]
        let media_box = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(self.size.width as f32),
            Object::Real(self.size.height as f32),
        ];
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => Object::Array(media_box),
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        debug!("Canvas finished with {} drawing calls", self.drawn);
        Ok(doc)
    }

    /// Serialize the canvas as a standalone PDF.
    pub fn to_pdf_bytes(self) -> Result<Vec<u8>> {
        let mut doc = self.finish()?;
        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save canvas: {e}")))?;
        Ok(output)
    }
}
