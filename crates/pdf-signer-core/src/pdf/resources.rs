//! Page dictionary lookups shared by the font scanner and the overlay merge.
//!
//! Resources and MediaBox can sit on the page itself, behind an indirect
//! reference, or on any ancestor Pages node.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::Size;

/// Depth limit when walking Parent links, guards against cycles.
const MAX_INHERIT_DEPTH: usize = 32;

/// US Letter, used when a page has no readable MediaBox.
const LETTER: MediaBox = MediaBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// A page's MediaBox in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl MediaBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width()), f64::from(self.height()))
    }
}

/// Numeric value of an Integer or Real object.
#[allow(clippy::cast_precision_loss)]
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follow one level of indirection.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve an object that should be a Dictionary (handles References).
pub fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d.clone()),
        _ => None,
    }
}

fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    match doc.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        Ok(_) => Err(Error::Lopdf(format!("page {page_id:?} is not a dictionary"))),
        Err(e) => Err(Error::Lopdf(format!("Failed to get page: {e}"))),
    }
}

/// Look up `key` on the page, then on its ancestors.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut dict = page_dict(doc, page_id)?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Ok(Some(resolve(doc, value)));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => match doc.get_object(*parent_id) {
                Ok(Object::Dictionary(parent)) => dict = parent,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// The page's effective Resources dictionary (a copy), empty if none.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    Ok(inherited(doc, page_id, b"Resources")?
        .and_then(|obj| match obj {
            Object::Dictionary(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap_or_default())
}

/// Replace the page's Resources with an inline dictionary.
pub fn set_page_resources(doc: &mut Document, page_id: ObjectId, resources: Dictionary) -> Result<()> {
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    match page {
        Object::Dictionary(dict) => {
            dict.set("Resources", Object::Dictionary(resources));
            Ok(())
        }
        _ => Err(Error::Lopdf(format!("page {page_id:?} is not a dictionary"))),
    }
}

/// The page's MediaBox, US Letter if it is missing or malformed.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<MediaBox> {
    let Some(Object::Array(arr)) = inherited(doc, page_id, b"MediaBox")? else {
        return Ok(LETTER);
    };

    let values: Vec<f32> = arr
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();

    if let [llx, lly, urx, ury] = values[..] {
        Ok(MediaBox {
            llx: llx.min(urx),
            lly: lly.min(ury),
            urx: llx.max(urx),
            ury: lly.max(ury),
        })
    } else {
        Ok(LETTER)
    }
}

/// The font dictionaries in a Resources dictionary, by resource name.
pub fn font_dicts(doc: &Document, resources: &Dictionary) -> Vec<(Vec<u8>, Dictionary)> {
    let Some(fonts) = resources.get(b"Font").ok().and_then(|f| resolve_dict(doc, f)) else {
        return Vec::new();
    };

    fonts
        .iter()
        .filter_map(|(name, obj)| resolve_dict(doc, obj).map(|d| (name.clone(), d)))
        .collect()
}

/// Pick a resource name with `prefix` that `dict` does not use yet.
pub fn unused_name(dict: &Dictionary, prefix: &str) -> String {
    (1..)
        .map(|i| format!("{prefix}{i}"))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_inherited_box() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), Object::Real(842.0)],
                "Resources" => dictionary! { "Font" => dictionary! {} },
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn test_media_box_inherited() {
        let (doc, page_id) = doc_with_inherited_box();
        let mb = media_box(&doc, page_id).unwrap();
        assert!((mb.width() - 595.0).abs() < f32::EPSILON);
        assert!((mb.height() - 842.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_resources_inherited() {
        let (doc, page_id) = doc_with_inherited_box();
        let res = page_resources(&doc, page_id).unwrap();
        assert!(res.has(b"Font"));
    }

    #[test]
    fn test_unused_name() {
        let dict = dictionary! { "Ovl1" => 1 };
        assert_eq!(unused_name(&dict, "Ovl"), "Ovl2");
    }
}
