mod document;
mod page_index;
mod render;
pub(crate) mod resources;
pub mod canvas;
pub mod font;
pub mod inventory;
pub mod merge;
pub mod signature;
pub mod sniff;

pub use canvas::OverlayCanvas;
pub use document::{DocumentMetadata, PdfDocument};
pub use font::{EmbeddedFont, FontBook, ResolvedFont};
pub use inventory::TextSpan;
pub use page_index::PageIndex;
pub use render::{DEFAULT_RENDER_SCALE, DEFAULT_THUMBNAIL_SCALE, PageRenderer, RenderedPage, Thumbnail};
pub use resources::MediaBox;
pub use signature::SignatureImage;
pub use sniff::FontProperties;
