//! Items placed over the page raster in the editor.
//!
//! Positions and sizes here are raster pixels, origin top-left. Each item
//! kind declares what the user may do with it through [`Capabilities`];
//! the scene refuses anything an item does not support.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::geometry::{CoordinateMapper, Point, Rect, Size};
use crate::store::{DEFAULT_BOX_HEIGHT, DEFAULT_BOX_WIDTH, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, TextBoxRecord};

/// Identifies an item within one scene.
pub type ItemId = u64;

/// Where a text box lands when it is added without a position.
pub const DEFAULT_TEXT_BOX_POSITION: Point = Point::new(200.0, 200.0);

/// Top-left of an `item` sized rectangle whose bottom-right corner sits
/// `margin` px inside the bottom-right corner of `page`.
pub fn inset_bottom_right(page: Size, item: Size, margin: f64) -> Point {
    Point::new(
        page.width - item.width - margin,
        page.height - item.height - margin,
    )
}

/// What the user may do with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub movable: bool,
    pub selectable: bool,
    pub editable_text: bool,
    pub resizable: bool,
}

/// A free text box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBox {
    pub text: String,
    pub position: Point,
    pub size: Size,
    pub font_family: String,
    pub font_size: u32,
}

impl Default for TextBox {
    fn default() -> Self {
        Self {
            text: String::new(),
            position: DEFAULT_TEXT_BOX_POSITION,
            size: Size::new(DEFAULT_BOX_WIDTH, DEFAULT_BOX_HEIGHT),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl TextBox {
    /// Rebuild a saved box for a page shown through `mapper`.
    ///
    /// Saved raster coordinates are used verbatim. Records that only carry
    /// point coordinates are mapped back, undoing their stored scale.
    pub fn from_record(record: &TextBoxRecord, mapper: &CoordinateMapper) -> Self {
        let position = match (record.scene_x, record.scene_y) {
            (Some(x), Some(y)) => Point::new(x, y),
            _ => {
                let unscale = |v: f64, s: f64| if s == 0.0 || !s.is_finite() { v } else { v / s };
                let (per_px_x, per_px_y) = mapper.pdf_per_pixel();
                Point::new(
                    unscale(record.pdf_x, record.scale_x) * per_px_x.recip(),
                    unscale(record.pdf_y, record.scale_y) * per_px_y.recip(),
                )
            }
        };

        Self {
            text: record.text.clone(),
            position,
            size: Size::new(record.width, record.height),
            font_family: record.font_family.clone(),
            font_size: record.font_size,
        }
    }

    /// Record for the store, with point coordinates for flattening.
    pub fn to_record(&self, mapper: &CoordinateMapper) -> TextBoxRecord {
        let pdf = mapper.to_pdf(self.position);
        let (scale_x, scale_y) = mapper.pdf_per_pixel();
        TextBoxRecord {
            text: self.text.clone(),
            pdf_x: pdf.x,
            pdf_y: pdf.y,
            scene_x: Some(self.position.x),
            scene_y: Some(self.position.y),
            width: self.size.width,
            height: self.size.height,
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            scale_x,
            scale_y,
        }
    }
}

/// The draggable signature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signature {
    pub position: Point,
    pub size: Size,
}

/// Anything that sits on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneItem {
    TextBox(TextBox),
    Signature(Signature),
}

impl SceneItem {
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Self::TextBox(_) => Capabilities {
                movable: true,
                selectable: true,
                editable_text: true,
                resizable: true,
            },
            Self::Signature(_) => Capabilities {
                movable: true,
                selectable: false,
                editable_text: false,
                resizable: false,
            },
        }
    }

    pub const fn bounds(&self) -> Rect {
        match self {
            Self::TextBox(tb) => Rect::new(tb.position, tb.size),
            Self::Signature(sig) => Rect::new(sig.position, sig.size),
        }
    }
}

/// The items over one page raster.
#[derive(Debug, Clone)]
pub struct Scene {
    page: usize,
    mapper: CoordinateMapper,
    items: BTreeMap<ItemId, SceneItem>,
    next_id: ItemId,
    selected: Option<ItemId>,
}

impl Scene {
    pub const fn new(page: usize, mapper: CoordinateMapper) -> Self {
        Self {
            page,
            mapper,
            items: BTreeMap::new(),
            next_id: 1,
            selected: None,
        }
    }

    pub const fn page(&self) -> usize {
        self.page
    }

    pub const fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// The page raster's extent.
    pub const fn bounds(&self) -> Rect {
        Rect::new(Point::new(0.0, 0.0), self.mapper.display)
    }

    fn insert(&mut self, item: SceneItem) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: ItemId) -> Result<&SceneItem> {
        self.items.get(&id).ok_or(Error::UnknownItem(id))
    }

    fn require(&mut self, id: ItemId, capability: &'static str, allowed: fn(Capabilities) -> bool) -> Result<&mut SceneItem> {
        let item = self.items.get_mut(&id).ok_or(Error::UnknownItem(id))?;
        if allowed(item.capabilities()) {
            Ok(item)
        } else {
            Err(Error::NotCapable { id, capability })
        }
    }

    pub fn add_text_box(&mut self, text_box: TextBox) -> ItemId {
        self.insert(SceneItem::TextBox(text_box))
    }

    /// Place the signature, replacing any previous one. The position is
    /// clamped so the image stays on the page.
    pub fn place_signature(&mut self, position: Point, size: Size) -> ItemId {
        self.remove_signature();
        let position = self.clamp(position, size);
        self.insert(SceneItem::Signature(Signature { position, size }))
    }

    /// Default signature spot: bottom-right corner inset by `margin` px.
    pub fn default_signature_position(&self, size: Size, margin: f64) -> Point {
        inset_bottom_right(self.mapper.display, size, margin)
    }

    pub fn remove_signature(&mut self) -> Option<Signature> {
        let id = self.signature_id()?;
        match self.items.remove(&id) {
            Some(SceneItem::Signature(sig)) => Some(sig),
            _ => None,
        }
    }

    fn signature_id(&self) -> Option<ItemId> {
        self.items
            .iter()
            .find(|(_, item)| matches!(item, SceneItem::Signature(_)))
            .map(|(id, _)| *id)
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.items.values().find_map(|item| match item {
            SceneItem::Signature(sig) => Some(sig),
            SceneItem::TextBox(_) => None,
        })
    }

    /// Keep a rectangle of `size` inside the raster. When it is larger than
    /// the page its right/bottom edge is aligned with the page instead.
    fn clamp(&self, p: Point, size: Size) -> Point {
        let page = self.mapper.display;
        let mut x = p.x.max(0.0);
        let mut y = p.y.max(0.0);
        if x + size.width > page.width {
            x = page.width - size.width;
        }
        if y + size.height > page.height {
            y = page.height - size.height;
        }
        Point::new(x, y)
    }

    /// Move an item. Signatures are clamped to the page; returns where it landed.
    pub fn move_item(&mut self, id: ItemId, to: Point) -> Result<Point> {
        let clamped = match self.get(id)? {
            SceneItem::Signature(sig) => self.clamp(to, sig.size),
            SceneItem::TextBox(_) => to,
        };
        match self.require(id, "movable", |c| c.movable)? {
            SceneItem::TextBox(tb) => tb.position = clamped,
            SceneItem::Signature(sig) => sig.position = clamped,
        }
        Ok(clamped)
    }

    pub fn select(&mut self, id: ItemId) -> Result<()> {
        self.require(id, "selectable", |c| c.selectable)?;
        self.selected = Some(id);
        Ok(())
    }

    pub const fn selected(&self) -> Option<ItemId> {
        self.selected
    }

    fn text_box_mut(&mut self, id: ItemId, capability: &'static str, allowed: fn(Capabilities) -> bool) -> Result<&mut TextBox> {
        match self.require(id, capability, allowed)? {
            SceneItem::TextBox(tb) => Ok(tb),
            SceneItem::Signature(_) => Err(Error::NotCapable { id, capability }),
        }
    }

    pub fn set_text(&mut self, id: ItemId, text: &str) -> Result<()> {
        self.text_box_mut(id, "editable", |c| c.editable_text)?.text = text.to_string();
        Ok(())
    }

    pub fn set_font(&mut self, id: ItemId, family: &str, size: u32) -> Result<()> {
        let tb = self.text_box_mut(id, "editable", |c| c.editable_text)?;
        tb.font_family = family.to_string();
        tb.font_size = size;
        Ok(())
    }

    pub fn resize(&mut self, id: ItemId, size: Size) -> Result<()> {
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "{}x{} is not a valid box size",
                size.width, size.height
            )));
        }
        self.text_box_mut(id, "resizable", |c| c.resizable)?.size = size;
        Ok(())
    }

    pub fn remove(&mut self, id: ItemId) -> Result<SceneItem> {
        let item = self.items.remove(&id).ok_or(Error::UnknownItem(id))?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(item)
    }

    /// Text boxes in creation order.
    pub fn text_boxes(&self) -> impl Iterator<Item = (ItemId, &TextBox)> {
        self.items.iter().filter_map(|(id, item)| match item {
            SceneItem::TextBox(tb) => Some((*id, tb)),
            SceneItem::Signature(_) => None,
        })
    }

    pub fn text_box_count(&self) -> usize {
        self.text_boxes().count()
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &SceneItem)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    /// Drop every text box, keeping the signature.
    pub fn clear_text_boxes(&mut self) {
        self.items.retain(|_, item| matches!(item, SceneItem::Signature(_)));
        self.selected = None;
    }

    /// Store records for every text box on this page.
    pub fn to_records(&self) -> Vec<TextBoxRecord> {
        self.text_boxes().map(|(_, tb)| tb.to_record(&self.mapper)).collect()
    }
}
