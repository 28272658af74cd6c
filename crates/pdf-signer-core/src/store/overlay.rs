use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::file::{read_json_lenient, remove_file, write_json_atomic};
use crate::error::{Error, Result};

/// Default text box size in raster pixels.
pub const DEFAULT_BOX_WIDTH: f64 = 200.0;
pub const DEFAULT_BOX_HEIGHT: f64 = 60.0;

/// Default font for new and legacy records.
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
pub const DEFAULT_FONT_SIZE: u32 = 12;

/// One persisted text box.
///
/// `pdf_x`/`pdf_y` are top-down point coordinates used when flattening;
/// `scene_x`/`scene_y` are the raster position the editor restores verbatim.
/// Files written before scene coordinates existed use `x`/`y` and
/// `display_scale_x`/`display_scale_y`, accepted here as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBoxRecord {
    pub text: String,
    #[serde(alias = "x")]
    pub pdf_x: f64,
    #[serde(alias = "y")]
    pub pdf_y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_y: Option<f64>,
    pub width: f64,
    pub height: f64,
    pub font_family: String,
    #[serde(deserialize_with = "font_size_lenient")]
    pub font_size: u32,
    #[serde(alias = "display_scale_x")]
    pub scale_x: f64,
    #[serde(alias = "display_scale_y")]
    pub scale_y: f64,
}

impl Default for TextBoxRecord {
    fn default() -> Self {
        Self {
            text: String::new(),
            pdf_x: 0.0,
            pdf_y: 0.0,
            scene_x: None,
            scene_y: None,
            width: DEFAULT_BOX_WIDTH,
            height: DEFAULT_BOX_HEIGHT,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Accept `12` as well as `12.0` for the font size.
fn font_size_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let size = f64::deserialize(deserializer)?;
    if size.is_finite() && size >= 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(size.round().min(f64::from(u32::MAX)) as u32)
    } else {
        Err(serde::de::Error::custom(format!("invalid font size {size}")))
    }
}

/// All text boxes saved for one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOverlaySet {
    pub page_num: usize,
    pub text_boxes: Vec<TextBoxRecord>,
    pub timestamp: String,
}

/// Saved overlays keyed by zero-based page index.
pub type OverlayMap = BTreeMap<usize, PageOverlaySet>;

/// Flat JSON store of per-page text boxes.
///
/// The file maps `"<pageIndex>"` to a [`PageOverlaySet`]. Every save reads
/// the whole file, replaces one page's entry and rewrites the file. Entries
/// for other pages are carried as raw JSON text and written back byte for
/// byte.
#[derive(Debug, Clone)]
pub struct OverlayStore {
    path: PathBuf,
}

impl OverlayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> BTreeMap<String, Box<RawValue>> {
        read_json_lenient(&self.path).unwrap_or_default()
    }

    /// Replace the text boxes of `page`, leaving every other page untouched.
    pub fn save(&self, page: usize, records: &[TextBoxRecord]) -> Result<()> {
        let mut all = self.read_raw();

        let set = PageOverlaySet {
            page_num: page,
            text_boxes: records.to_vec(),
            timestamp: crate::util::timestamp_now(),
        };
        let value = serde_json::value::to_raw_value(&set).map_err(|e| Error::StoreWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        all.insert(page.to_string(), value);

        write_json_atomic(&self.path, &all)?;
        debug!("Saved {} text boxes for page {}", records.len(), page);
        Ok(())
    }

    /// The saved set for `page`, if any.
    pub fn load_page_set(&self, page: usize) -> Option<PageOverlaySet> {
        let mut all = self.read_raw();
        let value = all.remove(&page.to_string())?;
        match serde_json::from_str(value.get()) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!("Ignoring malformed text boxes for page {}: {}", page, e);
                None
            }
        }
    }

    /// Text boxes for `page`, empty when nothing was saved.
    pub fn load_page(&self, page: usize) -> Vec<TextBoxRecord> {
        self.load_page_set(page)
            .map(|set| set.text_boxes)
            .unwrap_or_default()
    }

    /// Every saved page.
    pub fn load_all(&self) -> OverlayMap {
        self.read_raw()
            .into_iter()
            .filter_map(|(key, value)| {
                let Ok(page) = key.parse::<usize>() else {
                    warn!("Ignoring text boxes under non-numeric key '{}'", key);
                    return None;
                };
                match serde_json::from_str::<PageOverlaySet>(value.get()) {
                    Ok(set) => Some((page, set)),
                    Err(e) => {
                        warn!("Ignoring malformed text boxes for page {}: {}", page, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// `Some(page)` loads one page, `None` loads everything.
    pub fn load(&self, page: Option<usize>) -> OverlayMap {
        match page {
            Some(page) => self
                .load_page_set(page)
                .map(|set| OverlayMap::from([(page, set)]))
                .unwrap_or_default(),
            None => self.load_all(),
        }
    }

    /// Delete the store file.
    pub fn clear(&self) -> Result<()> {
        remove_file(&self.path)
    }
}
