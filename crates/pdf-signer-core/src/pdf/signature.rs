//! The signature image, split into colour and alpha planes for embedding.

use std::path::Path;

use image::RgbaImage;
use lopdf::{Document, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::error::{Error, FileKind, Result};
use crate::geometry::Size;

/// Pixels in a `width` x `height` image, counted in `usize`.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// A decoded signature image.
#[derive(Debug, Clone)]
pub struct SignatureImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    /// Present only when some pixel is not fully opaque
    alpha: Option<Vec<u8>>,
}

impl SignatureImage {
    /// Decode any format the `image` crate understands.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::SignatureImage(e.to_string()))?
            .to_rgba8();
        Self::from_rgba(&img)
    }

    /// Load from disk. A missing file is a blocking [`Error::FileNotFound`].
    pub fn from_file(path: &Path) -> Result<Self> {
        crate::util::require_file(FileKind::Signature, path)?;
        let img = image::open(path)
            .map_err(|e| Error::SignatureImage(format!("{}: {e}", path.display())))?
            .to_rgba8();
        Self::from_rgba(&img)
    }

    pub fn from_rgba(img: &RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::SignatureImage("image has no pixels".to_string()));
        }

        let pixels = pixel_count(width, height);
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for pixel in img.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel[3]);
        }
        let translucent = alpha.iter().any(|&a| a < u8::MAX);

        Ok(Self {
            width,
            height,
            rgb,
            alpha: translucent.then_some(alpha),
        })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel size.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub const fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Add the image (and its soft mask) to `doc` as an Image XObject.
    pub fn embed(&self, doc: &mut Document) -> ObjectId {
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(self.width),
            "Height" => i64::from(self.height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };

        if let Some(alpha) = &self.alpha {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(self.width),
                    "Height" => i64::from(self.height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha.clone(),
            )
            .with_compression(true);
            let smask_id = doc.add_object(smask);
            image_dict.set("SMask", smask_id);
        }

        let id = doc.add_object(Stream::new(image_dict, self.rgb.clone()).with_compression(true));
        debug!(
            "Embedded signature {}x{} (alpha: {})",
            self.width,
            self.height,
            self.has_alpha()
        );
        id
    }
}
