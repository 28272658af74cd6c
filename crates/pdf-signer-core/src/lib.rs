//! PDF Signer Core Library
//!
//! This library provides the core functionality for signing PDF documents:
//! - Page rendering and page geometry (mupdf)
//! - Mapping between the page raster and PDF points
//! - Per-page text boxes and UI state persisted as JSON
//! - Font detection from existing page content
//! - Flattening text boxes and a signature image into a new PDF (lopdf)
//! - An editing session that a GUI or CLI host drives

pub mod config;
pub mod editor;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod pdf;
pub mod scene;
pub mod store;
pub mod util;

pub use config::{AppConfig, FontConfig, SignatureConfig, SignaturePage, TextColor};
pub use editor::{EditorSession, IdleTask, ScrollDirection};
pub use error::{Error, FileKind, Result};
pub use flatten::{FlattenReport, Flattener, ProgressCallback, SignatureStamp};
pub use geometry::{CoordinateMapper, Point, Rect, Size};
pub use pdf::{FontProperties, PageRenderer, PdfDocument, SignatureImage};
pub use scene::{Capabilities, ItemId, Scene, SceneItem, TextBox};
pub use store::{OverlayMap, OverlayStore, PageOverlaySet, Stores, TextBoxRecord, UiState, UiStateStore};

use std::path::Path;
use tracing::{debug, info};

/// High-level signer: one document, its stores, and the configuration.
///
/// Use [`PdfSigner::flatten`] for a non-interactive export of whatever is
/// saved, or [`PdfSigner::into_session`] to edit.
pub struct PdfSigner {
    config: AppConfig,
    document: PdfDocument,
    stores: Stores,
}

impl PdfSigner {
    /// Open the configured document with the configured stores.
    pub fn new(config: AppConfig) -> Result<Self> {
        let document = PdfDocument::from_file(config.document_path()?)?;
        Ok(Self::with_document(config, document))
    }

    /// Use an already opened document.
    pub fn with_document(config: AppConfig, document: PdfDocument) -> Self {
        let stores = Stores::from_config(&config);
        Self {
            config,
            document,
            stores,
        }
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn document(&self) -> &PdfDocument {
        &self.document
    }

    pub const fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Load the configured signature image, if one is configured.
    pub fn signature_image(&self) -> Result<Option<SignatureImage>> {
        self.config
            .signature
            .path
            .as_deref()
            .map(SignatureImage::from_file)
            .transpose()
    }

    /// Suggested font for new text boxes on a page.
    pub fn detect_font(&self, page_num: usize) -> Result<FontProperties> {
        pdf::sniff::detect_page(&self.document, page_num)
    }

    /// Flatten the saved text boxes and, unless `text_only`, the signature
    /// at its saved (or default) position into `output`.
    pub fn flatten(
        &self,
        output: &Path,
        text_only: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<FlattenReport> {
        let overlays = self.stores.overlays.load_all();
        debug!("Flattening with saved text boxes on {} pages", overlays.len());

        let stamp = if text_only {
            None
        } else {
            self.signature_stamp()?
        };

        info!(
            "Flattening {} pages to {}",
            self.document.page_count(),
            output.display()
        );
        Flattener::from_config(&self.config).flatten_to_file(
            &self.document,
            &overlays,
            stamp.as_ref(),
            output,
            progress,
        )
    }

    /// The signature at its saved position, or at the default spot.
    fn signature_stamp(&self) -> Result<Option<SignatureStamp>> {
        let Some(image) = self.signature_image()? else {
            return Ok(None);
        };
        let Some(page) = self.config.signature.page.resolve(self.document.page_count()) else {
            return Ok(None);
        };

        let position = match self
            .stores
            .ui_state
            .load()
            .and_then(|state| state.signature_position)
        {
            Some(saved) => saved.to_point(),
            None => flatten::default_signature_position(&self.document, &self.config, page, &image)?,
        };

        Ok(Some(SignatureStamp::new(image, position, self.config.signature.scale)))
    }

    /// Start an editing session on the last page.
    pub fn into_session(self) -> Result<EditorSession> {
        let signature = self.signature_image()?;
        EditorSession::with_parts(self.config, self.document, self.stores, signature)
    }
}

/// Convenience function to render a page from a document as PNG
pub fn render_page(doc: &PdfDocument, page_num: usize, scale: f32) -> Result<Vec<u8>> {
    let renderer = PageRenderer::with_scale(doc, scale);
    renderer.render_page_png(page_num)
}

/// Convenience function to render a page from a document as WebP
pub fn render_page_webp(doc: &PdfDocument, page_num: usize, scale: f32) -> Result<Vec<u8>> {
    let renderer = PageRenderer::with_scale(doc, scale);
    renderer.render_page_webp(page_num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.signature.page, SignaturePage::Last);
        assert_eq!(config.fonts.default_family, "Helvetica");
        assert!((config.render_scale - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_document_is_blocking() {
        let config = AppConfig {
            document: Some("/nonexistent/contract.pdf".into()),
            ..AppConfig::default()
        };
        let err = PdfSigner::new(config).err();
        assert!(err.is_some_and(|e| e.is_blocking()));
    }
}
