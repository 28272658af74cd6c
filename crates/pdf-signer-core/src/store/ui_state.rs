use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::file::{read_json_lenient, remove_file, write_json_atomic};
use crate::error::Result;
use crate::geometry::Point;

/// Top-left corner of the signature in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePosition {
    pub x: i64,
    pub y: i64,
}

impl SignaturePosition {
    /// Round a raster point to whole pixels.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_point(p: Point) -> Self {
        Self {
            x: p.x.round() as i64,
            y: p.y.round() as i64,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn to_point(self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Editor state restored on the next launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    pub scroll_position: i64,
    pub signature_position: Option<SignaturePosition>,
    /// Display zoom, which is also the signature's raster scale
    pub zoom_level: f64,
    pub current_page: usize,
    pub total_pages: usize,
    pub timestamp: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            scroll_position: 0,
            signature_position: None,
            zoom_level: 1.0,
            current_page: 0,
            total_pages: 0,
            timestamp: String::new(),
        }
    }
}

impl UiState {
    /// Snapshot stamped with the current time.
    pub fn new(
        scroll_position: i64,
        signature_position: Option<SignaturePosition>,
        zoom_level: f64,
        current_page: usize,
        total_pages: usize,
    ) -> Self {
        Self {
            scroll_position,
            signature_position,
            zoom_level,
            current_page,
            total_pages,
            timestamp: crate::util::timestamp_now(),
        }
    }
}

/// Single-record JSON store for [`UiState`], replaced wholesale on save.
#[derive(Debug, Clone)]
pub struct UiStateStore {
    path: PathBuf,
}

impl UiStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &UiState) -> Result<()> {
        write_json_atomic(&self.path, state)
    }

    /// The saved state, or `None` if absent or unreadable.
    pub fn load(&self) -> Option<UiState> {
        read_json_lenient(&self.path)
    }

    pub fn clear(&self) -> Result<()> {
        remove_file(&self.path)
    }
}
