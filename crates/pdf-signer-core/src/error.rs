use std::path::PathBuf;

use thiserror::Error;

/// What kind of input file was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Signature,
    Font,
    Config,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Document => "PDF document",
            Self::Signature => "signature image",
            Self::Font => "font file",
            Self::Config => "config file",
        };
        f.write_str(name)
    }
}

/// Unified error type for pdf-signer-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Missing input files (blocking for the caller)
/// - PDF operations (opening, rendering, scanning, merging, saving)
/// - Overlay drawing (fonts, text, signature image)
/// - Store operations (overlay and UI-state files)
/// - Configuration and editor operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required input file does not exist
    #[error("{kind} not found: {}", path.display())]
    FileNotFound { kind: FileKind, path: PathBuf },

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to read the text/font inventory of a page
    #[error("failed to scan fonts on page {page}: {reason}")]
    PdfFontScan { page: usize, reason: String },

    /// Failed to merge an overlay canvas onto a page
    #[error("failed to merge overlay onto page {page}: {reason}")]
    PdfMerge { page: usize, reason: String },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Output path would overwrite the source document
    #[error("output path {} is the source document", .0.display())]
    OutputIsSource(PathBuf),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Drawing Errors
    // ==========================================================================
    /// Requested font family cannot be drawn
    #[error("font family '{0}' is not available")]
    FontUnavailable(String),

    /// Failed to parse a TrueType font
    #[error("failed to load font '{family}': {reason}")]
    FontLoad { family: String, reason: String },

    /// Drawing call issued in an invalid canvas state
    #[error("canvas error: {0}")]
    Canvas(String),

    /// Signature image could not be decoded
    #[error("invalid signature image: {0}")]
    SignatureImage(String),

    // ==========================================================================
    // Store Errors
    // ==========================================================================
    /// Failed to write a store file
    #[error("failed to save {}: {reason}", path.display())]
    StoreWrite { path: PathBuf, reason: String },

    // ==========================================================================
    // Editor Errors
    // ==========================================================================
    /// No scene item with the given id
    #[error("no scene item with id {0}")]
    UnknownItem(u64),

    /// Item does not support the requested interaction
    #[error("scene item {id} is not {capability}")]
    NotCapable { id: u64, capability: &'static str },

    /// The signature cannot be placed on this page
    #[error("no signature on page {page}: {reason}")]
    SignatureUnavailable { page: usize, reason: String },

    /// Size or position that cannot be applied to an item
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must block further use of the document
    /// (as opposed to a warning the caller can show and continue past).
    pub const fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. } | Self::PdfOpen(_) | Self::ConfigLoad(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
