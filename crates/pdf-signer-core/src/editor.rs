//! The editing session: one document, one page at a time.
//!
//! The session owns the working copy of the current page's items. It
//! commits them to the overlay store on navigation and explicit save, and
//! never touches the store otherwise. Work that has to wait until the host
//! has laid out a freshly loaded page goes on an idle queue which the host
//! drains with [`EditorSession::run_idle`].

use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::flatten::{FlattenReport, Flattener, ProgressCallback, SignatureStamp, default_signature_position};
use crate::geometry::{CoordinateMapper, Point, Size};
use crate::pdf::sniff::{self, FontProperties};
use crate::pdf::{PageIndex, PageRenderer, PdfDocument, RenderedPage, SignatureImage};
use crate::scene::{ItemId, Scene, SceneItem, TextBox};
use crate::store::{PageOverlaySet, SignaturePosition, Stores, UiState};

/// Pixels moved by one scroll step.
pub const SCROLL_STEP: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Deferred work, run on the host's next idle tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleTask {
    /// Load the saved text boxes of a page into the scene
    RestoreTextBoxes { page: usize },
    /// Put the signature back where it was saved
    RestoreSignature { page: usize, position: Point },
    /// Restore the scroll offset
    RestoreScroll(i64),
}

/// An open document being annotated.
pub struct EditorSession {
    config: AppConfig,
    document: PdfDocument,
    stores: Stores,
    signature_image: Option<SignatureImage>,
    /// Signature placement, kept while other pages are shown
    signature_position: Option<Point>,
    scene: Scene,
    /// Raster of the current page; the scene maps against its pixel size
    raster: Option<RenderedPage>,
    font: FontProperties,
    scroll: i64,
    idle: VecDeque<IdleTask>,
}

impl EditorSession {
    /// Open the configured document and signature, showing the last page.
    ///
    /// A missing document or signature file is a blocking error. Without a
    /// configured signature the session is text-only.
    pub fn open(config: AppConfig) -> Result<Self> {
        let document = PdfDocument::from_file(config.document_path()?)?;
        let signature_image = config
            .signature
            .path
            .as_deref()
            .map(SignatureImage::from_file)
            .transpose()?;
        let stores = Stores::from_config(&config);
        Self::with_parts(config, document, stores, signature_image)
    }

    /// Session over an already opened document.
    pub fn with_parts(
        config: AppConfig,
        document: PdfDocument,
        stores: Stores,
        signature_image: Option<SignatureImage>,
    ) -> Result<Self> {
        let last = PageIndex::last(document.page_count()).ok_or_else(|| {
            Error::PdfOpen("document has no pages".to_string())
        })?;

        let mut session = Self {
            config,
            document,
            stores,
            signature_image,
            signature_position: None,
            scene: Scene::new(0, CoordinateMapper::identity()),
            raster: None,
            font: FontProperties::default(),
            scroll: 0,
            idle: VecDeque::new(),
        };
        session.load_page(last.get())?;
        info!(
            "Opened {} pages, showing page {}",
            session.total_pages(),
            session.current_page() + 1
        );
        Ok(session)
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

    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The current page as rendered for display.
    pub fn page_raster(&self) -> Option<&RenderedPage> {
        self.raster.as_ref()
    }

    pub const fn current_page(&self) -> usize {
        self.scene.page()
    }

    pub fn total_pages(&self) -> usize {
        self.document.page_count()
    }

    /// Font suggested for new text boxes on this page.
    pub const fn font_properties(&self) -> &FontProperties {
        &self.font
    }

    pub const fn scroll_position(&self) -> i64 {
        self.scroll
    }

    pub fn pending_idle_tasks(&self) -> usize {
        self.idle.len()
    }

    /// Page index that carries the signature under the configured policy.
    pub fn signature_page(&self) -> Option<usize> {
        self.config.signature.page.resolve(self.total_pages())
    }

    /// Signature size on the raster.
    fn signature_raster_size(&self) -> Option<Size> {
        self.signature_image
            .as_ref()
            .map(|img| img.size().scaled(self.config.signature.scale))
    }

    /// Current signature placement in raster pixels, if any.
    pub fn signature_position(&self) -> Option<Point> {
        self.scene
            .signature()
            .map(|sig| sig.position)
            .or(self.signature_position)
    }

    /// Switch pages, committing the current page's text boxes first.
    /// A failed commit is logged and does not stop navigation.
    pub fn go_to_page(&mut self, page: usize) -> Result<()> {
        self.document.page(page)?;
        // Restores still queued for this page must land before it is saved
        self.run_idle();
        if let Err(e) = self.commit_page() {
            warn!("Could not save text boxes of page {}: {}", self.current_page(), e);
        }
        self.load_page(page)
    }

    /// Build a fresh scene for `page` and queue its text boxes for restore.
    fn load_page(&mut self, page: usize) -> Result<()> {
        let raster = PageRenderer::with_scale(&self.document, self.config.render_scale).render_page(page)?;
        self.scene = Scene::new(page, raster.mapper());
        self.raster = Some(raster);

        self.font = match sniff::detect_page(&self.document, page) {
            Ok(props) => props,
            Err(e) => {
                warn!("Font detection failed on page {}: {}", page, e);
                FontProperties::default()
            }
        };

        if self.signature_page() == Some(page)
            && let Some(size) = self.signature_raster_size()
        {
            let position = self.signature_position.unwrap_or_else(|| {
                self.scene
                    .default_signature_position(size, self.config.signature.margin)
            });
            let placed = self.scene.place_signature(position, size);
            debug!("Signature item {} on page {}", placed, page);
        }

        // Restores queued for the previous scene no longer apply
        self.idle
            .retain(|task| matches!(task, IdleTask::RestoreScroll(_)));
        self.idle.push_back(IdleTask::RestoreTextBoxes { page });
        Ok(())
    }

    /// Run every queued idle task. Tasks queued for a page that is no
    /// longer shown are dropped. Returns how many tasks ran.
    pub fn run_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.idle.pop_front() {
            match task {
                IdleTask::RestoreTextBoxes { page } if page == self.current_page() => {
                    let records = self.stores.overlays.load_page(page);
                    for record in &records {
                        let tb = TextBox::from_record(record, self.scene.mapper());
                        self.scene.add_text_box(tb);
                    }
                    debug!("Restored {} text boxes on page {}", records.len(), page);
                }
                IdleTask::RestoreSignature { page, position } if page == self.current_page() => {
                    if let Err(e) = self.place_signature(position) {
                        warn!("Could not restore signature: {}", e);
                    }
                }
                IdleTask::RestoreScroll(offset) => self.scroll = offset.max(0),
                stale => {
                    debug!("Dropping stale idle task {:?}", stale);
                    continue;
                }
            }
            ran += 1;
        }
        ran
    }

    /// Add a text box using the page's detected font. Without a position
    /// it lands at the default spot.
    pub fn add_text_box(&mut self, position: Option<Point>, text: &str) -> ItemId {
        let mut tb = TextBox {
            text: text.to_string(),
            font_family: self.font.family.clone(),
            font_size: self.font.size,
            ..TextBox::default()
        };
        if let Some(position) = position {
            tb.position = position;
        }
        self.scene.add_text_box(tb)
    }

    pub fn move_item(&mut self, id: ItemId, to: Point) -> Result<Point> {
        let landed = self.scene.move_item(id, to)?;
        if matches!(self.scene.get(id)?, SceneItem::Signature(_)) {
            self.signature_position = Some(landed);
        }
        Ok(landed)
    }

    pub fn edit_text(&mut self, id: ItemId, text: &str) -> Result<()> {
        self.scene.set_text(id, text)
    }

    pub fn set_font(&mut self, id: ItemId, family: &str, size: u32) -> Result<()> {
        self.scene.set_font(id, family, size)
    }

    pub fn resize(&mut self, id: ItemId, size: Size) -> Result<()> {
        self.scene.resize(id, size)
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<()> {
        self.scene.remove(id).map(|_| ())
    }

    /// Put the signature at `position` (raster px) on the signature page.
    pub fn place_signature(&mut self, position: Point) -> Result<Point> {
        let page = self.current_page();
        if self.signature_page() != Some(page) {
            return Err(Error::SignatureUnavailable {
                page,
                reason: "the signature goes on another page".to_string(),
            });
        }
        let size = self.signature_raster_size().ok_or_else(|| Error::SignatureUnavailable {
            page,
            reason: "no signature image configured".to_string(),
        })?;

        self.scene.place_signature(position, size);
        let landed = self.scene.signature().map_or(position, |sig| sig.position);
        self.signature_position = Some(landed);
        Ok(landed)
    }

    /// Forget the signature placement; it returns to the default spot.
    pub fn clear_signature(&mut self) {
        self.scene.remove_signature();
        self.signature_position = None;
    }

    /// Write the current page's text boxes to the overlay store.
    pub fn commit_page(&self) -> Result<()> {
        self.stores
            .overlays
            .save(self.current_page(), &self.scene.to_records())
    }

    /// Save the UI state, then the current page's text boxes.
    pub fn save_state(&mut self) -> Result<()> {
        self.run_idle();
        let state = UiState::new(
            self.scroll,
            self.signature_position().map(SignaturePosition::from_point),
            self.config.signature.scale,
            self.current_page(),
            self.total_pages(),
        );
        self.stores.ui_state.save(&state)?;
        self.commit_page()
    }

    /// Return to the saved page, then queue signature and scroll restore.
    /// Returns false when there is no saved state.
    pub fn restore_state(&mut self) -> Result<bool> {
        let Some(state) = self.stores.ui_state.load() else {
            return Ok(false);
        };

        if state.current_page < self.total_pages() {
            self.load_page(state.current_page)?;
        } else {
            warn!(
                "Saved page {} is outside the document ({} pages)",
                state.current_page,
                self.total_pages()
            );
        }

        if let Some(pos) = state.signature_position {
            let position = pos.to_point();
            self.signature_position = Some(position);
            if self.signature_page() == Some(self.current_page()) {
                self.idle.push_back(IdleTask::RestoreSignature {
                    page: self.current_page(),
                    position,
                });
            }
        }
        self.idle.push_back(IdleTask::RestoreScroll(state.scroll_position));
        Ok(true)
    }

    pub fn scroll(&mut self, direction: ScrollDirection) -> i64 {
        self.scroll = match direction {
            ScrollDirection::Up => (self.scroll - SCROLL_STEP).max(0),
            ScrollDirection::Down => self.scroll + SCROLL_STEP,
        };
        self.scroll
    }

    /// `Page i / n | Signature: (x, y) | Text Boxes: k`
    pub fn status_line(&self) -> String {
        let signature = self.signature_position().map_or_else(
            || "N/A".to_string(),
            |p| {
                let pos = SignaturePosition::from_point(p);
                format!("({}, {})", pos.x, pos.y)
            },
        );
        format!(
            "Page {} / {} | Signature: {} | Text Boxes: {}",
            self.current_page() + 1,
            self.total_pages(),
            signature,
            self.scene.text_box_count()
        )
    }

    /// Flatten every page's saved text boxes, the current page's working
    /// copy and (unless `text_only`) the signature into `output`.
    pub fn export(
        &mut self,
        output: &Path,
        text_only: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<FlattenReport> {
        self.run_idle();
        if let Err(e) = self.commit_page() {
            warn!("Could not save text boxes of page {}: {}", self.current_page(), e);
        }

        let mut overlays = self.stores.overlays.load_all();
        overlays.insert(
            self.current_page(),
            PageOverlaySet {
                page_num: self.current_page(),
                text_boxes: self.scene.to_records(),
                timestamp: crate::util::timestamp_now(),
            },
        );

        let stamp = if text_only {
            None
        } else {
            self.signature_image.as_ref().and_then(|image| {
                let position = self.signature_position().or_else(|| {
                    let page = self.signature_page()?;
                    default_signature_position(&self.document, &self.config, page, image).ok()
                })?;
                Some(SignatureStamp::new(image.clone(), position, self.config.signature.scale))
            })
        };

        Flattener::from_config(&self.config).flatten_to_file(
            &self.document,
            &overlays,
            stamp.as_ref(),
            output,
            progress,
        )
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("document", &self.document)
            .field("current_page", &self.current_page())
            .field("signature_position", &self.signature_position())
            .field("pending_idle_tasks", &self.idle.len())
            .finish_non_exhaustive()
    }
}
