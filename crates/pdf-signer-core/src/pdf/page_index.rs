//! Zero-based page index validated against a document.
//!
//! The editor and the store count pages from 0, mupdf takes an `i32`, and
//! lopdf numbers pages from 1. This type is the single place that converts.

use std::fmt;

use crate::error::Error;

/// A page index known to be inside its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex {
    index: usize,
    total: usize,
}

impl PageIndex {
    /// Validate `page` against a document with `total` pages.
    pub fn new(page: usize, total: usize) -> Result<Self, Error> {
        if page >= total || i32::try_from(page).is_err() {
            return Err(Error::PdfInvalidPage { page, total });
        }
        Ok(Self { index: page, total })
    }

    /// The final page of a document, if it has any.
    pub fn last(total: usize) -> Option<Self> {
        total.checked_sub(1).and_then(|i| Self::new(i, total).ok())
    }

    pub const fn get(self) -> usize {
        self.index
    }

    pub const fn total(self) -> usize {
        self.total
    }

    pub const fn is_last(self) -> bool {
        self.index + 1 == self.total
    }

    /// Index as mupdf expects it. Range was checked on construction.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn mupdf(self) -> i32 {
        self.index as i32
    }

    /// 1-based page number for lopdf's `get_pages` map.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn lopdf_number(self) -> u32 {
        (self.index + 1) as u32
    }

    /// Label shown next to thumbnails ("P1" for the first page).
    pub fn label(self) -> String {
        format!("P{}", self.index + 1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.index + 1, self.total)
    }
}
