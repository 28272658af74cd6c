//! Text/font inventory of a page.
//!
//! Walks the page content stream and reports one [`TextSpan`] per
//! text-showing operator, with the font that was current at the time.
//! Form XObjects drawn with `Do` are walked too, with their own resources.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::{Error, Result};
use super::resources::{font_dicts, number, page_resources, resolve, resolve_dict};

/// Forms nested deeper than this are not walked.
const MAX_FORM_DEPTH: usize = 8;

/// One run of shown text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Font size in points: Tf size times the vertical scale of the text
    /// matrix and the current transformation matrix
    pub size: f32,
    /// BaseFont name, subset prefix included (e.g. "ABCDEF+Times-Roman")
    pub font: String,
}

impl TextSpan {
    pub fn new(size: f32, font: impl Into<String>) -> Self {
        Self {
            size,
            font: font.into(),
        }
    }
}

/// Affine matrix `[a b c d e f]`, row-vector order as PDF writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().map(number).collect::<Option<_>>()?;
        <[f32; 6]>::try_from(values).ok().map(Self)
    }

    /// `self` applied first, then `outer`.
    fn then(self, outer: Self) -> Self {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = outer.0;
        Self([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    /// Length of the unit vertical vector once transformed.
    fn vertical_scale(self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        c.hypot(d)
    }
}

/// Graphics state saved and restored by `q`/`Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<String>,
    tf_size: f32,
}

/// BaseFont names of the fonts in a Resources dictionary, by resource name.
fn base_font_names(doc: &Document, resources: &Dictionary) -> HashMap<Vec<u8>, String> {
    font_dicts(doc, resources)
        .into_iter()
        .map(|(name, dict)| {
            let base = match dict.get(b"BaseFont") {
                Ok(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
                _ => String::from_utf8_lossy(&name).into_owned(),
            };
            (name, base)
        })
        .collect()
}

struct SpanScanner<'a> {
    doc: &'a Document,
    page: usize,
    spans: Vec<TextSpan>,
    /// Forms being walked, innermost last
    active_forms: Vec<ObjectId>,
}

impl SpanScanner<'_> {
    fn scan_error(&self, reason: String) -> Error {
        Error::PdfFontScan {
            page: self.page,
            reason,
        }
    }

    fn scan(&mut self, raw: &[u8], resources: &Dictionary, ctm: Matrix) -> Result<()> {
        let content = Content::decode(raw)
            .map_err(|e| self.scan_error(format!("Failed to decode content: {e}")))?;
        let base_fonts = base_font_names(self.doc, resources);

        let mut state = GraphicsState {
            ctm,
            font: None,
            tf_size: 0.0,
        };
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state = previous;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        state.ctm = m.then(state.ctm);
                    }
                }
                "BT" => text_matrix = Matrix::IDENTITY,
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        text_matrix = m;
                    }
                }
                "Tf" => {
                    if let [Object::Name(name), size] = op.operands.as_slice() {
                        state.font = Some(
                            base_fonts
                                .get(name)
                                .cloned()
                                .unwrap_or_else(|| String::from_utf8_lossy(name).into_owned()),
                        );
                        state.tf_size = number(size).unwrap_or(0.0);
                    }
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    if let Some(font) = &state.font {
                        let scale = text_matrix.then(state.ctm).vertical_scale();
                        let size = (state.tf_size * scale).abs();
                        if size > 0.0 {
                            self.spans.push(TextSpan::new(size, font.clone()));
                        }
                    }
                }
                "Do" => {
                    if let [Object::Name(name)] = op.operands.as_slice() {
                        self.scan_form(name, resources, state.ctm);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Walk the Form XObject `name`, if that is what it names. A form that
    /// cannot be read contributes no spans.
    fn scan_form(&mut self, name: &[u8], resources: &Dictionary, ctm: Matrix) {
        let doc = self.doc;
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| resolve_dict(doc, x))
        else {
            return;
        };
        let Ok(&Object::Reference(id)) = xobjects.get(name) else {
            return;
        };
        if self.active_forms.contains(&id) || self.active_forms.len() >= MAX_FORM_DEPTH {
            debug!("Not descending into form {:?} again", id);
            return;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form") {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| match resolve(doc, m) {
                Object::Array(values) => Matrix::from_operands(values),
                _ => None,
            })
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .unwrap_or_else(|| resources.clone());
        let raw = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        self.active_forms.push(id);
        if let Err(e) = self.scan(&raw, &form_resources, matrix.then(ctm)) {
            debug!("Skipping form {:?}: {}", id, e);
        }
        self.active_forms.pop();
    }
}

/// Collect the text spans of a page from lopdf bytes.
pub fn page_text_spans(pdf_bytes: &[u8], page_num: usize) -> Result<Vec<TextSpan>> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| Error::PdfFontScan {
        page: page_num,
        reason: format!("Failed to load PDF: {e}"),
    })?;
    document_text_spans(&doc, page_num)
}

/// Collect the text spans of a page of an already loaded document.
pub fn document_text_spans(doc: &Document, page_num: usize) -> Result<Vec<TextSpan>> {
    let pages = doc.get_pages();
    let page_index = super::page_index::PageIndex::new(page_num, pages.len())?;
    let page_id = *pages
        .get(&page_index.lopdf_number())
        .ok_or(Error::PdfInvalidPage {
            page: page_num,
            total: pages.len(),
        })?;

    let mut scanner = SpanScanner {
        doc,
        page: page_num,
        spans: Vec::new(),
        active_forms: Vec::new(),
    };

    let resources = page_resources(doc, page_id)?;
    let raw = doc
        .get_page_content(page_id)
        .map_err(|e| scanner.scan_error(format!("Failed to read content: {e}")))?;
    scanner.scan(&raw, &resources, Matrix::IDENTITY)?;

    Ok(scanner.spans)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, dictionary};

    fn pdf_with_ops(ops: Vec<Operation>) -> Vec<u8> {
        pdf_with_form(ops, Vec::new())
    }

    /// A page with `ops` whose resources name a Form XObject `Fm1` drawing
    /// `form_ops`. The form scales by 2, carries its own Courier font as
    /// `F9` and lists itself under its XObjects.
    fn pdf_with_form(ops: Vec<Operation>, form_ops: Vec<Operation>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let times = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        });
        let courier = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let form_id = doc.new_object_id();
        let form_content = Content { operations: form_ops }.encode().unwrap();
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Matrix" => vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()],
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "F9" => courier },
                        "XObject" => dictionary! { "Fm1" => form_id },
                    },
                },
                form_content,
            )),
        );

        let content = Content { operations: ops }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => times, "F2" => courier },
                "XObject" => dictionary! { "Fm1" => form_id },
            },
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
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
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_spans_follow_tf() {
        let pdf = pdf_with_ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Tj", vec![Object::string_literal("one")]),
            Operation::new("Tf", vec!["F2".into(), Object::Real(14.0)]),
            Operation::new("Tj", vec![Object::string_literal("two")]),
            Operation::new("ET", vec![]),
        ]);

        let spans = page_text_spans(&pdf, 0).unwrap();
        assert_eq!(
            spans,
            vec![TextSpan::new(10.0, "Times-Roman"), TextSpan::new(14.0, "Courier")]
        );
    }

    #[test]
    fn test_text_matrix_scales_size() {
        let pdf = pdf_with_ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 1.into()]),
            Operation::new(
                "Tm",
                vec![12.into(), 0.into(), 0.into(), 12.into(), 72.into(), 700.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal("scaled")]),
            Operation::new("ET", vec![]),
        ]);

        let spans = page_text_spans(&pdf, 0).unwrap();
        assert_eq!(spans.len(), 1);
        assert!((spans[0].size - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_transformation_matrix_scales_size() {
        let pdf = pdf_with_ops(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(0.1),
                    0.into(),
                    0.into(),
                    Object::Real(0.1),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 120.into()]),
            Operation::new("Tj", vec![Object::string_literal("small")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 120.into()]),
            Operation::new("Tj", vec![Object::string_literal("large")]),
            Operation::new("ET", vec![]),
        ]);

        let spans = page_text_spans(&pdf, 0).unwrap();
        assert_eq!(spans.len(), 2);
        assert!((spans[0].size - 12.0).abs() < 1e-4);
        assert!((spans[1].size - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_form_xobject_text_uses_form_resources() {
        let pdf = pdf_with_form(
            vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![Object::Real(1.5), 0.into(), 0.into(), Object::Real(1.5), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec!["Fm1".into()]),
                Operation::new("Q", vec![]),
            ],
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F9".into(), 4.into()]),
                Operation::new("Tj", vec![Object::string_literal("inside")]),
                Operation::new("ET", vec![]),
                Operation::new("Do", vec!["Fm1".into()]),
            ],
        );

        let spans = page_text_spans(&pdf, 0).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].font, "Courier");
        assert!((spans[0].size - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_no_text_no_spans() {
        let pdf = pdf_with_ops(vec![Operation::new("re", vec![
            0.into(),
            0.into(),
            10.into(),
            10.into(),
        ])]);
        assert!(page_text_spans(&pdf, 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_page() {
        let pdf = pdf_with_ops(vec![]);
        assert!(matches!(
            page_text_spans(&pdf, 4),
            Err(Error::PdfInvalidPage { page: 4, total: 1 })
        ));
    }
}
