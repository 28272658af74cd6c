//! Lay a finished overlay canvas over one page of a document.
//!
//! The canvas page becomes a Form XObject drawn after the page's own
//! content. The original content streams are bracketed with `q`/`Q` so
//! any graphics state they leave behind cannot leak into the overlay.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::error::{Error, Result};
use super::resources::{media_box, page_resources, resolve_dict, set_page_resources, unused_name};

/// Merge the single page of `overlay` onto `page_id` of `doc`.
pub fn merge_overlay_page(
    doc: &mut Document,
    page_id: ObjectId,
    page_num: usize,
    mut overlay: Document,
) -> Result<()> {
    let merge_err = |reason: String| Error::PdfMerge {
        page: page_num,
        reason,
    };

    let target_box = media_box(doc, page_id)?;

    // Move the overlay's object ids above everything in the target
    overlay.renumber_objects_with(doc.max_id + 1);

    let overlay_page_id = *overlay
        .get_pages()
        .get(&1)
        .ok_or_else(|| merge_err("overlay has no page".to_string()))?;
    let overlay_content = overlay
        .get_page_content(overlay_page_id)
        .map_err(|e| merge_err(format!("Failed to read overlay content: {e}")))?;
    let overlay_resources = page_resources(&overlay, overlay_page_id)?;
    let overlay_box = media_box(&overlay, overlay_page_id)?;

    let content_ids: BTreeSet<ObjectId> = overlay.get_page_contents(overlay_page_id).into_iter().collect();

    doc.max_id = doc.max_id.max(overlay.max_id);
    for (object_id, object) in overlay.objects {
        if content_ids.contains(&object_id) {
            continue;
        }
        match object.type_name().unwrap_or(b"") {
            b"Catalog" | b"Pages" | b"Page" => {}
            _ => {
                doc.objects.insert(object_id, object);
            }
        }
    }

    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(overlay_box.width()),
                Object::Real(overlay_box.height()),
            ]),
            "Matrix" => Object::Array(vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(target_box.llx),
                Object::Real(target_box.lly),
            ]),
            "Resources" => overlay_resources,
        },
        overlay_content,
    )
    .with_compression(true);
    let form_id = doc.add_object(form);

    let mut resources = page_resources(doc, page_id)?;
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_default();
    let form_name = unused_name(&xobjects, "Ovl");
    xobjects.set(form_name.as_str(), form_id);
    resources.set("XObject", xobjects);
    set_page_resources(doc, page_id, resources)?;

    wrap_page_contents(doc, page_id, &form_name).map_err(|e| merge_err(e.to_string()))?;

    debug!("Merged overlay onto page {} as /{}", page_num, form_name);
    Ok(())
}

/// Bracket the page's content with `q`/`Q` and append a call to the overlay form.
fn wrap_page_contents(doc: &mut Document, page_id: ObjectId, form_name: &str) -> Result<()> {
    let existing = match doc.get_dictionary(page_id) {
        Ok(dict) => dict.get(b"Contents").ok().cloned(),
        Err(e) => return Err(Error::Lopdf(format!("Failed to get page: {e}"))),
    };

    // Contents may point at an array of streams
    let existing = match existing {
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(arr)) => Some(Object::Array(arr.clone())),
            _ => Some(Object::Reference(id)),
        },
        other => other,
    };

    let suffix = format!("\nQ\nq /{form_name} Do Q\n");

    let contents = match existing {
        Some(Object::Reference(existing_id)) => {
            let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix.into_bytes()));
            Object::Array(vec![
                Object::Reference(prefix_id),
                Object::Reference(existing_id),
                Object::Reference(suffix_id),
            ])
        }
        Some(Object::Array(arr)) if !arr.is_empty() => {
            let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix.into_bytes()));
            let mut wrapped = Vec::with_capacity(arr.len() + 2);
            wrapped.push(Object::Reference(prefix_id));
            wrapped.extend(arr);
            wrapped.push(Object::Reference(suffix_id));
            Object::Array(wrapped)
        }
        _ => {
            let call_id = doc.add_object(Stream::new(
                Dictionary::new(),
                format!("q /{form_name} Do Q\n").into_bytes(),
            ));
            Object::Reference(call_id)
        }
    };

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
    match page {
        Object::Dictionary(dict) => {
            dict.set("Contents", contents);
            Ok(())
        }
        _ => Err(Error::Lopdf(format!("page {page_id:?} is not a dictionary"))),
    }
}
