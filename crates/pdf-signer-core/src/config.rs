use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, FileKind};

/// Fill color for overlay text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "blue" => Some(Self::blue()),
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            _ => None,
        }
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Which page of the document carries the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePage {
    /// The final page of the document
    #[default]
    Last,
    /// The first page of the document
    First,
    /// A fixed zero-based page index
    Index(usize),
}

impl SignaturePage {
    /// Resolve the policy against a document with `total_pages` pages.
    ///
    /// Returns `None` when the document is empty or the index is out of range.
    pub const fn resolve(self, total_pages: usize) -> Option<usize> {
        if total_pages == 0 {
            return None;
        }
        match self {
            Self::Last => Some(total_pages - 1),
            Self::First => Some(0),
            Self::Index(i) if i < total_pages => Some(i),
            Self::Index(_) => None,
        }
    }
}

/// Signature image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Path to the signature image (PNG with transparency recommended)
    pub path: Option<PathBuf>,

    /// Raster scale applied to the image's pixel size when displayed
    #[serde(default = "default_signature_scale")]
    pub scale: f64,

    /// Page selection policy
    #[serde(default)]
    pub page: SignaturePage,

    /// Inset (raster px) from the bottom-right corner for the default placement
    #[serde(default = "default_signature_margin")]
    pub margin: f64,
}

const fn default_signature_scale() -> f64 {
    0.3
}

const fn default_signature_margin() -> f64 {
    100.0
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            path: None,
            scale: default_signature_scale(),
            page: SignaturePage::default(),
            margin: default_signature_margin(),
        }
    }
}

/// Font configuration for text boxes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// Family used when a text box asks for one that cannot be drawn
    #[serde(default = "default_font_family")]
    pub default_family: String,

    /// TrueType files to embed, keyed by family name (e.g. "SimSun")
    #[serde(default)]
    pub truetype: BTreeMap<String, PathBuf>,
}

fn default_font_family() -> String {
    "Helvetica".to_string()
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            default_family: default_font_family(),
            truetype: BTreeMap::new(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input PDF document
    pub document: Option<PathBuf>,

    /// Output PDF (defaults to `<stem>_signed.pdf` beside the input)
    pub output: Option<PathBuf>,

    /// UI-state JSON file
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Per-page text box JSON file
    #[serde(default = "default_overlay_file")]
    pub overlay_file: PathBuf,

    /// Page raster scale for display (default: 2.0 for high DPI)
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Page raster scale for navigation thumbnails
    #[serde(default = "default_thumbnail_scale")]
    pub thumbnail_scale: f32,

    /// Text box fill color
    #[serde(default)]
    pub text_color: TextColor,

    /// Signature configuration
    #[serde(default)]
    pub signature: SignatureConfig,

    /// Font configuration
    #[serde(default)]
    pub fonts: FontConfig,
}

fn default_state_file() -> PathBuf {
    crate::util::default_state_dir().join("ui_state.json")
}

fn default_overlay_file() -> PathBuf {
    crate::util::default_state_dir().join("text_boxes.json")
}

const fn default_render_scale() -> f32 {
    2.0
}

const fn default_thumbnail_scale() -> f32 {
    0.3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            document: None,
            output: None,
            state_file: default_state_file(),
            overlay_file: default_overlay_file(),
            render_scale: default_render_scale(),
            thumbnail_scale: default_thumbnail_scale(),
            text_color: TextColor::default(),
            signature: SignatureConfig::default(),
            fonts: FontConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        crate::util::require_file(FileKind::Config, path)?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigLoad(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/pdf-signer/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-signer").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Reject values the renderer and mapper cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(Error::ConfigInvalid {
                field: "render_scale".to_string(),
                reason: format!("must be a positive number, got {}", self.render_scale),
            });
        }
        if !(self.thumbnail_scale.is_finite() && self.thumbnail_scale > 0.0) {
            return Err(Error::ConfigInvalid {
                field: "thumbnail_scale".to_string(),
                reason: format!("must be a positive number, got {}", self.thumbnail_scale),
            });
        }
        if !(self.signature.scale.is_finite() && self.signature.scale > 0.0) {
            return Err(Error::ConfigInvalid {
                field: "signature.scale".to_string(),
                reason: format!("must be a positive number, got {}", self.signature.scale),
            });
        }
        Ok(())
    }

    /// Input document path, or an error if none was configured.
    pub fn document_path(&self) -> Result<&Path, Error> {
        self.document.as_deref().ok_or_else(|| Error::ConfigInvalid {
            field: "document".to_string(),
            reason: "no input PDF configured".to_string(),
        })
    }

    /// Output path, falling back to `<stem>_signed.pdf` beside the input.
    pub fn output_path(&self) -> Result<PathBuf, Error> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        Ok(crate::util::default_output_path(self.document_path()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_page_policy() {
        assert_eq!(SignaturePage::Last.resolve(7), Some(6));
        assert_eq!(SignaturePage::First.resolve(7), Some(0));
        assert_eq!(SignaturePage::Index(3).resolve(7), Some(3));
        assert_eq!(SignaturePage::Index(7).resolve(7), None);
        assert_eq!(SignaturePage::Last.resolve(0), None);
    }

    #[test]
    fn test_parse_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            document = "/docs/contract.pdf"
            render_scale = 1.5

            [signature]
            path = "/docs/sign.png"
            page = { index = 2 }

            [fonts.truetype]
            SimSun = "/usr/share/fonts/simsun.ttf"
            "#,
        )
        .unwrap();

        assert_eq!(config.document, Some(PathBuf::from("/docs/contract.pdf")));
        assert!((config.render_scale - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.signature.page, SignaturePage::Index(2));
        assert!((config.signature.scale - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.fonts.default_family, "Helvetica");
        assert!(config.fonts.truetype.contains_key("SimSun"));
        assert_eq!(config.text_color, TextColor::black());
    }

    #[test]
    fn test_signature_page_last_from_toml() {
        let config: SignatureConfig = toml::from_str(r#"page = "last""#).unwrap();
        assert_eq!(config.page, SignaturePage::Last);
    }

    #[test]
    fn test_output_path_defaults_beside_input() {
        let config = AppConfig {
            document: Some(PathBuf::from("/docs/xxx.pdf")),
            ..Default::default()
        };
        assert_eq!(config.output_path().unwrap(), PathBuf::from("/docs/xxx_signed.pdf"));
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let config = AppConfig {
            render_scale: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));
    }
}
