//! Guess a font for new text boxes from the fonts already on a page.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::store::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};
use super::document::PdfDocument;
use super::inventory::{TextSpan, page_text_spans};

/// Known PDF font names and the family a text box should use for them.
/// Matched case-insensitively as substrings, first match wins.
const FAMILY_TABLE: &[(&str, &str)] = &[
    ("Helvetica", "Helvetica"),
    ("Times-Roman", "Times New Roman"),
    ("Arial", "Arial"),
    ("Courier", "Courier New"),
    ("SimSun", "SimSun"),
    ("SimHei", "SimHei"),
];

/// Font family and size to seed a new text box with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontProperties {
    pub family: String,
    pub size: u32,
}

impl Default for FontProperties {
    fn default() -> Self {
        Self {
            family: DEFAULT_FONT_FAMILY.to_string(),
            size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Pick family and size from a page's spans.
///
/// Size is the mean of all span sizes, rounded half to even. Family comes
/// from the most frequent font name (earliest seen wins a tie) looked up in
/// [`FAMILY_TABLE`]. Defaults are Helvetica 12.
pub fn detect(spans: &[TextSpan]) -> FontProperties {
    let mut props = FontProperties::default();
    if spans.is_empty() {
        return props;
    }

    let total: f64 = spans.iter().map(|s| f64::from(s.size)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / spans.len() as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        props.size = mean.round_ties_even().max(0.0) as u32;
    }

    if let Some(name) = most_frequent(spans.iter().map(|s| s.font.as_str())) {
        let lower = name.to_lowercase();
        if let Some((_, family)) = FAMILY_TABLE
            .iter()
            .find(|(pdf_name, _)| lower.contains(&pdf_name.to_lowercase()))
        {
            props.family = (*family).to_string();
        }
    }

    props
}

/// Most frequent item, ties resolved in favor of the first one seen.
fn most_frequent<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for name in names {
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name)
}

/// Detect font properties for one page of a document.
pub fn detect_page(doc: &PdfDocument, page_num: usize) -> Result<FontProperties> {
    let spans = page_text_spans(doc.bytes(), page_num)?;
    let props = detect(&spans);
    debug!(
        "Page {}: {} text spans, suggesting {} {}pt",
        page_num,
        spans.len(),
        props.family,
        props.size
    );
    Ok(props)
}
