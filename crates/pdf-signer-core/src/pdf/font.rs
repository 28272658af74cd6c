//! Fonts for overlay text.
//!
//! Two kinds of font can be drawn:
//!
//! - **Standard 14** fonts (Helvetica, Times-Roman, Courier, ...) are
//!   referenced by name and never embedded. Text is encoded as WinAnsi.
//! - **TrueType** fonts listed in the configuration are embedded as a
//!   composite font so any glyph they carry can be drawn:
//!   - **Type0 font**: the top-level font dictionary, Identity-H encoded
//!     - **CIDFontType2**: glyph widths, references the descriptor
//!       - **FontDescriptor** + **FontFile2**: metrics and the font program
//!     - **ToUnicode CMap**: glyph IDs back to Unicode for copy/paste

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};
use ttf_parser::{Face, GlyphId};

use crate::config::FontConfig;
use crate::error::{Error, FileKind, Result};

/// The base-14 font names every conforming reader provides.
pub const STANDARD_14: &[&str] = &[
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

/// Common family names and the standard font that stands in for them.
const FAMILY_ALIASES: &[(&str, &str)] = &[
    ("Arial", "Helvetica"),
    ("Times New Roman", "Times-Roman"),
    ("Times", "Times-Roman"),
    ("Courier New", "Courier"),
];

/// Code points 0x80..=0x9F of WinAnsiEncoding. Latin-1 covers the rest.
const WIN_ANSI_HIGH: &[(char, u8)] = &[
    ('€', 0x80),
    ('‚', 0x82),
    ('ƒ', 0x83),
    ('„', 0x84),
    ('…', 0x85),
    ('†', 0x86),
    ('‡', 0x87),
    ('ˆ', 0x88),
    ('‰', 0x89),
    ('Š', 0x8A),
    ('‹', 0x8B),
    ('Œ', 0x8C),
    ('Ž', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('•', 0x95),
    ('–', 0x96),
    ('—', 0x97),
    ('˜', 0x98),
    ('™', 0x99),
    ('š', 0x9A),
    ('›', 0x9B),
    ('œ', 0x9C),
    ('ž', 0x9E),
    ('Ÿ', 0x9F),
];

/// Encode text as WinAnsi bytes. Unrepresentable characters become `?`;
/// the second value counts them.
pub fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|c| {
            let code = u32::from(c);
            if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) {
                #[allow(clippy::cast_possible_truncation)]
                return code as u8;
            }
            WIN_ANSI_HIGH
                .iter()
                .find(|(ch, _)| *ch == c)
                .map_or_else(
                    || {
                        replaced += 1;
                        b'?'
                    },
                    |(_, b)| *b,
                )
        })
        .collect();
    (bytes, replaced)
}

/// A TrueType font loaded at runtime for embedding.
pub struct EmbeddedFont {
    /// Family name it was configured under
    family: String,
    /// PDF BaseFont name (family without spaces)
    base_name: String,
    data: Arc<Vec<u8>>,
}

impl EmbeddedFont {
    /// Parse a TrueType font program.
    pub fn from_bytes(family: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let family = family.into();
        Face::parse(&data, 0).map_err(|e| Error::FontLoad {
            family: family.clone(),
            reason: e.to_string(),
        })?;

        let base_name: String = family.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
        Ok(Self {
            base_name: if base_name.is_empty() { "Embedded".to_string() } else { base_name },
            family,
            data: Arc::new(data),
        })
    }

    /// Read and parse a `.ttf` file.
    pub fn from_file(family: impl Into<String>, path: &Path) -> Result<Self> {
        crate::util::require_file(FileKind::Font, path)?;
        let family = family.into();
        let data = std::fs::read(path).map_err(|e| Error::FontLoad {
            family: family.clone(),
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_bytes(family, data)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| Error::FontLoad {
            family: self.family.clone(),
            reason: e.to_string(),
        })
    }

    /// Glyph IDs for `text`, `.notdef` (0) where the font has no glyph.
    pub fn glyph_ids(&self, text: &str) -> Result<Vec<u16>> {
        let face = self.face()?;
        Ok(text
            .chars()
            .map(|c| face.glyph_index(c).map_or(0, |g| g.0))
            .collect())
    }

    /// Text as a hex string of glyph IDs (without angle brackets).
    pub fn to_hex_glyphs(&self, text: &str) -> Result<String> {
        Ok(self.glyph_ids(text)?.into_iter().fold(String::new(), |mut acc, gid| {
            let _ = write!(acc, "{gid:04X}");
            acc
        }))
    }

    /// Embed this font, with widths and ToUnicode entries for the
    /// characters in `used`. Returns the Type0 font object.
    pub fn embed(&self, doc: &mut Document, used: &str) -> Result<ObjectId> {
        let face = self.face()?;

        let mut glyphs: BTreeMap<u16, char> = BTreeMap::new();
        for c in used.chars() {
            if let Some(gid) = face.glyph_index(c) {
                glyphs.entry(gid.0).or_insert(c);
            }
        }

        let mut file_dict = Dictionary::new();
        #[allow(clippy::cast_possible_wrap)]
        file_dict.set("Length1", Object::Integer(self.data.len() as i64));
        let font_file_id = doc.add_object(Stream::new(file_dict, self.data.to_vec()).with_compression(true));

        let bbox = face.global_bounding_box();
        let descriptor_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Flags", Object::Integer(32)),
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(i64::from(bbox.x_min)),
                    Object::Integer(i64::from(bbox.y_min)),
                    Object::Integer(i64::from(bbox.x_max)),
                    Object::Integer(i64::from(bbox.y_max)),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(face.ascender()))),
            ("Descent", Object::Integer(i64::from(face.descender()))),
            (
                "CapHeight",
                Object::Integer(i64::from(face.capital_height().unwrap_or_else(|| face.ascender()))),
            ),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]));

        let units_per_em = i64::from(face.units_per_em().max(1));
        let scaled = |gid: u16| -> i64 {
            i64::from(face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0)) * 1000 / units_per_em
        };
        let default_width = face.glyph_index(' ').map_or(500, |g| scaled(g.0));

        let cid_font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                    ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(default_width)),
            ("W", Object::Array(widths_array(glyphs.keys().copied(), scaled))),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]));

        let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(&glyphs)));

        let type0_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]));

        debug!("Embedded {} with {} glyphs", self.family, glyphs.len());
        Ok(type0_id)
    }
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("family", &self.family)
            .field("base_name", &self.base_name)
            .field("bytes_len", &self.data.len())
            .finish()
    }
}

/// W array entries `[gid [w1 w2 ...]]`, grouping consecutive glyph IDs.
fn widths_array(gids: impl Iterator<Item = u16>, width: impl Fn(u16) -> i64) -> Vec<Object> {
    let mut result = Vec::new();
    let mut iter = gids.peekable();

    while let Some(first) = iter.next() {
        let mut widths = vec![Object::Integer(width(first))];
        let mut expected = first.wrapping_add(1);
        while iter.peek() == Some(&expected) {
            widths.push(Object::Integer(width(expected)));
            iter.next();
            expected = expected.wrapping_add(1);
        }
        result.push(Object::Integer(i64::from(first)));
        result.push(Object::Array(widths));
    }

    result
}

/// ToUnicode CMap with one bfchar entry per used glyph.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    // bfchar blocks hold at most 100 entries
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, c) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}

/// A font that a drawing call can use.
#[derive(Debug, Clone)]
pub enum ResolvedFont {
    /// One of [`STANDARD_14`]
    Standard(&'static str),
    /// A configured TrueType family
    TrueType(Arc<EmbeddedFont>),
}

impl ResolvedFont {
    /// Key that identifies the font program, used to share one resource.
    pub fn key(&self) -> &str {
        match self {
            Self::Standard(name) => name,
            Self::TrueType(font) => font.family(),
        }
    }
}

/// Maps font family names to drawable fonts.
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    truetype: BTreeMap<String, Arc<EmbeddedFont>>,
}

impl FontBook {
    /// Only the standard fonts.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Load every configured TrueType family. Files that fail to load are
    /// logged and left out; their family then resolves as unavailable.
    pub fn from_config(config: &FontConfig) -> Self {
        let mut book = Self::default();
        for (family, path) in &config.truetype {
            match EmbeddedFont::from_file(family.clone(), path) {
                Ok(font) => book.insert(font),
                Err(e) => warn!("Skipping font {}: {}", family, e),
            }
        }
        book
    }

    pub fn insert(&mut self, font: EmbeddedFont) {
        self.truetype.insert(font.family().to_lowercase(), Arc::new(font));
    }

    /// Resolve a family name: configured TrueType first, then the standard
    /// names, then the common aliases.
    pub fn resolve(&self, family: &str) -> Result<ResolvedFont> {
        let wanted = family.trim();
        if let Some(font) = self.truetype.get(&wanted.to_lowercase()) {
            return Ok(ResolvedFont::TrueType(Arc::clone(font)));
        }
        if let Some(name) = STANDARD_14.iter().find(|n| n.eq_ignore_ascii_case(wanted)) {
            return Ok(ResolvedFont::Standard(name));
        }
        FAMILY_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(wanted))
            .map(|(_, name)| ResolvedFont::Standard(name))
            .ok_or_else(|| Error::FontUnavailable(family.to_string()))
    }

    /// Families that resolve to an embedded font.
    pub fn truetype_families(&self) -> BTreeSet<&str> {
        self.truetype.values().map(|f| f.family()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_ascii_and_latin1() {
        let (bytes, replaced) = encode_win_ansi("Café €5");
        assert_eq!(bytes, b"Caf\xE9 \x805".to_vec());
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_win_ansi_replaces_unknown() {
        let (bytes, replaced) = encode_win_ansi("签A");
        assert_eq!(bytes, b"?A".to_vec());
        assert_eq!(replaced, 1);
    }

    #[test]
    fn test_resolve_standard_and_aliases() {
        let book = FontBook::standard();
        assert!(matches!(book.resolve("Helvetica"), Ok(ResolvedFont::Standard("Helvetica"))));
        assert!(matches!(book.resolve("courier"), Ok(ResolvedFont::Standard("Courier"))));
        assert!(matches!(
            book.resolve("Times New Roman"),
            Ok(ResolvedFont::Standard("Times-Roman"))
        ));
        assert!(matches!(book.resolve("Arial"), Ok(ResolvedFont::Standard("Helvetica"))));
    }

    #[test]
    fn test_unconfigured_cjk_family_unavailable() {
        let book = FontBook::standard();
        assert!(matches!(book.resolve("SimSun"), Err(Error::FontUnavailable(f)) if f == "SimSun"));
    }

    #[test]
    fn test_invalid_truetype_rejected() {
        let result = EmbeddedFont::from_bytes("Broken", b"not a font".to_vec());
        assert!(matches!(result, Err(Error::FontLoad { .. })));
    }

    #[test]
    fn test_missing_font_file_skipped() {
        let mut config = FontConfig::default();
        config
            .truetype
            .insert("SimSun".to_string(), "/nonexistent/simsun.ttf".into());
        let book = FontBook::from_config(&config);
        assert!(book.truetype_families().is_empty());
        assert!(book.resolve("SimSun").is_err());
    }

    #[test]
    fn test_widths_array_groups_runs() {
        let arr = widths_array([3u16, 4, 5, 9].into_iter(), |_| 600);
        assert_eq!(arr.len(), 4);
        assert!(matches!(arr[0], Object::Integer(3)));
        assert!(matches!(&arr[1], Object::Array(w) if w.len() == 3));
        assert!(matches!(arr[2], Object::Integer(9)));
    }

    #[test]
    fn test_to_unicode_has_entries() {
        let glyphs = BTreeMap::from([(36u16, 'A'), (1200u16, '签')]);
        let cmap = String::from_utf8(to_unicode_cmap(&glyphs)).unwrap_or_default();
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<04B0> <7B7E>"));
    }
}
