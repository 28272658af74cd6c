mod file;
mod overlay;
mod ui_state;

pub use overlay::{
    DEFAULT_BOX_HEIGHT, DEFAULT_BOX_WIDTH, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, OverlayMap,
    OverlayStore, PageOverlaySet, TextBoxRecord,
};
pub use ui_state::{SignaturePosition, UiState, UiStateStore};

use crate::config::AppConfig;

/// Both store files of one editing setup.
#[derive(Debug, Clone)]
pub struct Stores {
    pub overlays: OverlayStore,
    pub ui_state: UiStateStore,
}

impl Stores {
    pub fn new(overlays: OverlayStore, ui_state: UiStateStore) -> Self {
        Self { overlays, ui_state }
    }

    /// Stores at the paths named in the configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            OverlayStore::new(&config.overlay_file),
            UiStateStore::new(&config.state_file),
        )
    }
}
