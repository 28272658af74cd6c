use std::path::{Path, PathBuf};
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};

use crate::error::{Error, FileKind, Result};
use crate::geometry::Size;
use super::page_index::PageIndex;

/// An opened source PDF with its page geometry read up front.
pub struct PdfDocument {
    /// The raw PDF bytes, shared with the renderer and the flattener
    bytes: Arc<Vec<u8>>,
    /// File the document was read from, if any
    path: Option<PathBuf>,
    /// Cached metadata
    metadata: DocumentMetadata,
    /// Page sizes in points, in page order
    page_sizes: Vec<Size>,
}

/// Document metadata
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        let mut page_sizes = Vec::with_capacity(usize::try_from(page_count).unwrap_or(0));
        for i in 0..page_count {
            let page = doc
                .load_page(i)
                .map_err(|e| Error::PdfOpen(format!("Failed to load page {i}: {e}")))?;
            let bounds = page
                .bounds()
                .map_err(|e| Error::PdfOpen(format!("Failed to get bounds of page {i}: {e}")))?;
            page_sizes.push(Size::new(
                f64::from(bounds.x1 - bounds.x0),
                f64::from(bounds.y1 - bounds.y0),
            ));
        }

        // mupdf returns empty string if not present
        let get_meta = |name| -> Option<String> { doc.metadata(name).ok().filter(|s| !s.is_empty()) };

        let metadata = DocumentMetadata {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
            producer: get_meta(MetadataName::Producer),
        };

        Ok(Self {
            bytes: Arc::new(bytes),
            path: None,
            metadata,
            page_sizes,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        crate::util::require_file(FileKind::Document, path)?;

        let bytes = std::fs::read(path).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        let mut doc = Self::from_bytes(bytes)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// Validate a zero-based page number against this document.
    pub fn page(&self, page_num: usize) -> Result<PageIndex> {
        PageIndex::new(page_num, self.page_count())
    }

    /// Page size in points.
    pub fn page_size(&self, page_num: usize) -> Result<Size> {
        let index = self.page(page_num)?;
        Ok(self.page_sizes[index.get()])
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl Clone for PdfDocument {
    /// Cheap clone: the bytes are shared, only the small page table is copied.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            path: self.path.clone(),
            metadata: self.metadata.clone(),
            page_sizes: self.page_sizes.clone(),
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("path", &self.path)
            .field("page_count", &self.page_count())
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
