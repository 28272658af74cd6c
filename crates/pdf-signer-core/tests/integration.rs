//! Integration tests for pdf-signer-core
//!
//! These tests verify the end-to-end workflow:
//! - Opening and rendering a document
//! - Saving and restoring text boxes and UI state
//! - Editing a page in a session
//! - Flattening text boxes and the signature into a new PDF

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pdf_signer_core::{
    AppConfig, CoordinateMapper, EditorSession, Error, Flattener, OverlayMap, PageOverlaySet,
    PageRenderer, PdfDocument, PdfSigner, Point, SignatureImage, SignatureStamp, Size,
    TextBoxRecord,
};
use serde_json::value::RawValue;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

const PAGES: usize = 3;

/// A letter-size PDF whose pages each carry one line of Times-Roman 12pt text.
fn fixture_pdf(pages: usize) -> Vec<u8> {
    fixture_pdf_sized(pages, 612.0, 792.0)
}

/// Same pages at `width` x `height` points.
fn fixture_pdf_sized(pages: usize, width: f32, height: f32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });

    let mut kids = Vec::with_capacity(pages);
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)]),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Document, signature image and stores inside one temporary directory.
struct Workspace {
    dir: TempDir,
    config: AppConfig,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("contract.pdf");
        std::fs::write(&document, fixture_pdf(PAGES)).unwrap();

        let signature = dir.path().join("signature.png");
        RgbaImage::from_pixel(200, 100, Rgba([0, 0, 128, 200]))
            .save(&signature)
            .unwrap();

        let mut config = AppConfig {
            document: Some(document),
            state_file: dir.path().join("ui_state.json"),
            overlay_file: dir.path().join("text_boxes.json"),
            ..AppConfig::default()
        };
        config.signature.path = Some(signature);

        Self { dir, config }
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("contract_signed.pdf")
    }

    fn signer(&self) -> PdfSigner {
        PdfSigner::new(self.config.clone()).unwrap()
    }

    fn session(&self) -> EditorSession {
        EditorSession::open(self.config.clone()).unwrap()
    }
}

fn approved_record() -> TextBoxRecord {
    TextBoxRecord {
        text: "Approved".to_string(),
        pdf_x: 100.0,
        pdf_y: 50.0,
        font_family: "Helvetica".to_string(),
        font_size: 12,
        ..TextBoxRecord::default()
    }
}

fn stream_text(stream: &Stream) -> String {
    let bytes = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Content of every overlay form drawn on a page.
fn overlay_content(doc: &Document, page_id: ObjectId) -> String {
    let page = doc.get_dictionary(page_id).unwrap();
    let Ok(resources) = page.get(b"Resources") else {
        return String::new();
    };
    let resources = match resources {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        other => other.as_dict().unwrap(),
    };
    let Ok(xobjects) = resources.get(b"XObject") else {
        return String::new();
    };
    let xobjects = match xobjects {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        other => other.as_dict().unwrap(),
    };

    let mut content = String::new();
    for (name, value) in xobjects.iter() {
        if !name.starts_with(b"Ovl") {
            continue;
        }
        let id = value.as_reference().unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        content.push_str(&stream_text(stream));
    }
    content
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

// =============================================================================
// Document Tests
// =============================================================================

#[test]
fn test_fixture_loads() {
    let doc = PdfDocument::from_bytes(fixture_pdf(PAGES)).unwrap();
    assert_eq!(doc.page_count(), PAGES);
    let size = doc.page_size(0).unwrap();
    assert!((size.width - 612.0).abs() < 0.01);
    assert!((size.height - 792.0).abs() < 0.01);
}

#[test]
fn test_render_size_follows_scale() {
    let doc = PdfDocument::from_bytes(fixture_pdf(1)).unwrap();
    let rendered = PageRenderer::with_scale(&doc, 2.0).render_page(0).unwrap();
    assert_eq!(rendered.image.width(), 1224);
    assert_eq!(rendered.image.height(), 1584);
}

#[test]
fn test_display_size_matches_raster_on_fractional_page() {
    // A5 in points
    let doc = PdfDocument::from_bytes(fixture_pdf_sized(1, 419.53, 595.28)).unwrap();
    let renderer = PageRenderer::with_scale(&doc, 2.0);
    let rendered = renderer.render_page(0).unwrap();
    assert_eq!(renderer.display_size(0).unwrap(), rendered.display_size());
}

#[test]
fn test_thumbnails_labelled_per_page() {
    let doc = PdfDocument::from_bytes(fixture_pdf(PAGES)).unwrap();
    let thumbs = PageRenderer::with_scale(&doc, 0.3).thumbnails().unwrap();
    let labels: Vec<_> = thumbs.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, ["P1", "P2", "P3"]);
}

#[test]
fn test_font_detected_from_page() {
    let ws = Workspace::new();
    let props = ws.signer().detect_font(0).unwrap();
    assert_eq!(props.family, "Times New Roman");
    assert_eq!(props.size, 12);
}

#[test]
fn test_invalid_pdf_bytes() {
    let result = PdfDocument::from_bytes(b"not a pdf".to_vec());
    assert!(matches!(result, Err(Error::PdfOpen(_))));
}

#[test]
fn test_missing_signature_blocks_session() {
    let mut ws = Workspace::new();
    ws.config.signature.path = Some(ws.dir.path().join("missing.png"));
    let err = EditorSession::open(ws.config.clone()).unwrap_err();
    assert!(err.is_blocking());
}

// =============================================================================
// Store Tests
// =============================================================================

/// Records placed through a mapper whose ratios do not divide evenly.
fn mapped_records(count: usize) -> Vec<TextBoxRecord> {
    let mapper = CoordinateMapper::new(Size::new(1000.0, 1300.0), Size::new(612.0, 792.0));
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let step = i as f64;
            let scene = Point::new(113.0 + step * 7.3, 419.0 + step * 11.9);
            let pdf = mapper.to_pdf(scene);
            let (scale_x, scale_y) = mapper.pdf_per_pixel();
            TextBoxRecord {
                text: format!("Note {i}"),
                pdf_x: pdf.x,
                pdf_y: pdf.y,
                scene_x: Some(scene.x),
                scene_y: Some(scene.y),
                scale_x,
                scale_y,
                ..TextBoxRecord::default()
            }
        })
        .collect()
}

fn raw_entries(path: &Path) -> BTreeMap<String, String> {
    let text = std::fs::read_to_string(path).unwrap();
    let raw: BTreeMap<String, Box<RawValue>> = serde_json::from_str(&text).unwrap();
    raw.into_iter().map(|(k, v)| (k, v.get().to_string())).collect()
}

#[test]
fn test_saving_one_page_leaves_others_untouched() {
    let ws = Workspace::new();
    let store = ws.signer().stores().overlays.clone();
    store.save(0, &mapped_records(40)).unwrap();
    store.save(1, &mapped_records(3)).unwrap();

    let before = raw_entries(store.path());
    store.save(2, &[]).unwrap();
    let after = raw_entries(store.path());

    assert_eq!(before["0"], after["0"]);
    assert_eq!(before["1"], after["1"]);
    assert_eq!(store.load_page(0), mapped_records(40));
    assert!(store.load_page(2).is_empty());
}

#[test]
fn test_hand_written_entries_survive_other_saves() {
    let ws = Workspace::new();
    let entry = r#"{ "page_num": 0, "text_boxes": [ {"text": "Old", "x": 0.09416667231666667, "y": 1e2} ], "timestamp": "t" }"#;
    std::fs::write(&ws.config.overlay_file, format!("{{\"0\": {entry}}}")).unwrap();

    let signer = ws.signer();
    signer.stores().overlays.save(4, &[approved_record()]).unwrap();

    assert_eq!(raw_entries(&ws.config.overlay_file)["0"], entry);
}

#[test]
fn test_overlay_file_with_single_page() {
    let ws = Workspace::new();
    std::fs::write(
        &ws.config.overlay_file,
        r#"{"2": {"page_num": 2, "text_boxes": [{"text": "Hi", "x": 10, "y": 20, "font_size": 11.0}], "timestamp": "t"}}"#,
    )
    .unwrap();

    let signer = ws.signer();
    let store = &signer.stores().overlays;
    assert!(store.load(Some(5)).is_empty());
    let records = store.load_page(2);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "Hi");
    assert!((records[0].pdf_x - 10.0).abs() < f64::EPSILON);
    assert_eq!(records[0].font_size, 11);
    assert_eq!(store.load_all().len(), 1);
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_session_opens_on_last_page_with_default_signature() {
    let ws = Workspace::new();
    let session = ws.session();
    assert_eq!(session.current_page(), PAGES - 1);
    assert_eq!(session.signature_page(), Some(PAGES - 1));
    // 200x100 image at 0.3 is 60x30 px, inset 100 px on a 1224x1584 raster
    assert_eq!(
        session.status_line(),
        "Page 3 / 3 | Signature: (1064, 1454) | Text Boxes: 0"
    );
}

#[test]
fn test_session_maps_against_rendered_raster() {
    let ws = Workspace::new();
    std::fs::write(
        ws.config.document.as_ref().unwrap(),
        fixture_pdf_sized(1, 419.53, 595.28),
    )
    .unwrap();

    let session = ws.session();
    let raster = session.page_raster().unwrap();
    assert_eq!(session.scene().mapper().display, raster.display_size());
    assert_eq!(session.scene().mapper().pdf, raster.pdf_size);
}

#[test]
fn test_text_boxes_survive_navigation() {
    let ws = Workspace::new();
    let mut session = ws.session();
    session.run_idle();

    let id = session.add_text_box(Some(Point::new(200.0, 100.0)), "Approved");
    session.set_font(id, "Helvetica", 12).unwrap();
    session.go_to_page(0).unwrap();
    session.run_idle();
    assert_eq!(session.scene().text_box_count(), 0);

    let saved = ws.signer().stores().overlays.load_page(PAGES - 1);
    assert_eq!(saved.len(), 1);
    assert!((saved[0].pdf_x - 100.0).abs() < 1e-9);
    assert!((saved[0].pdf_y - 50.0).abs() < 1e-9);

    session.go_to_page(PAGES - 1).unwrap();
    assert_eq!(session.pending_idle_tasks(), 1);
    session.run_idle();
    assert_eq!(session.scene().text_box_count(), 1);
}

#[test]
fn test_signature_only_on_its_page() {
    let ws = Workspace::new();
    let mut session = ws.session();
    session.go_to_page(0).unwrap();
    let err = session.place_signature(Point::new(10.0, 10.0)).unwrap_err();
    assert!(matches!(err, Error::SignatureUnavailable { page: 0, .. }));
    assert!(session.status_line().contains("Signature: N/A"));
}

#[test]
fn test_state_restored_in_new_session() {
    let ws = Workspace::new();
    {
        let mut session = ws.session();
        session.place_signature(Point::new(5000.0, -20.0)).unwrap();
        session.add_text_box(None, "Name");
        session.save_state().unwrap();
    }

    let mut session = ws.session();
    assert!(session.restore_state().unwrap());
    session.run_idle();
    assert_eq!(
        session.status_line(),
        "Page 3 / 3 | Signature: (1164, 0) | Text Boxes: 1"
    );
}

#[test]
fn test_restore_without_saved_state() {
    let ws = Workspace::new();
    let mut session = ws.session();
    assert!(!session.restore_state().unwrap());
}

// =============================================================================
// Flatten Tests
// =============================================================================

#[test]
fn test_flatten_keeps_pages_and_places_text() {
    let ws = Workspace::new();
    let signer = ws.signer();
    signer
        .stores()
        .overlays
        .save(0, &[approved_record()])
        .unwrap();

    let report = signer.flatten(&ws.output(), true, None).unwrap();
    assert_eq!(report.pages, PAGES);
    assert_eq!(report.pages_changed, vec![0]);
    assert_eq!(report.text_drawn, 1);
    assert!(!report.signature_drawn);

    let out = Document::load(ws.output()).unwrap();
    let ids = page_ids(&out);
    assert_eq!(ids.len(), PAGES);
    // 792 - 50 - 12
    assert!(overlay_content(&out, ids[0]).contains("100 730 Td"));
    assert!(overlay_content(&out, ids[1]).is_empty());

    let reopened = PdfDocument::from_file(ws.output()).unwrap();
    assert_eq!(reopened.page_count(), PAGES);
}

#[test]
fn test_untouched_pages_keep_content() {
    let ws = Workspace::new();
    let signer = ws.signer();
    signer
        .stores()
        .overlays
        .save(0, &[approved_record()])
        .unwrap();
    signer.flatten(&ws.output(), true, None).unwrap();

    let source = Document::load_mem(&fixture_pdf(PAGES)).unwrap();
    let out = Document::load(ws.output()).unwrap();
    let (src_ids, out_ids) = (page_ids(&source), page_ids(&out));
    for page in 1..PAGES {
        assert_eq!(
            source.get_page_content(src_ids[page]).unwrap(),
            out.get_page_content(out_ids[page]).unwrap()
        );
    }
}

#[test]
fn test_signature_drawn_on_last_page_only() {
    let ws = Workspace::new();
    let report = ws.signer().flatten(&ws.output(), false, None).unwrap();
    assert!(report.signature_drawn);
    assert_eq!(report.pages_changed, vec![PAGES - 1]);

    let out = Document::load(ws.output()).unwrap();
    let ids = page_ids(&out);
    assert!(overlay_content(&out, ids[PAGES - 1]).contains("/Im1 Do"));
    for &id in &ids[..PAGES - 1] {
        assert!(!overlay_content(&out, id).contains(" Do"));
    }
}

#[test]
fn test_failing_text_box_skipped_beside_drawn_sibling() {
    let ws = Workspace::new();
    let signer = ws.signer();
    let unsized = TextBoxRecord {
        text: "No size".to_string(),
        font_size: 0,
        ..approved_record()
    };
    signer
        .stores()
        .overlays
        .save(1, &[unsized, approved_record()])
        .unwrap();

    let report = signer.flatten(&ws.output(), true, None).unwrap();
    assert_eq!(report.text_skipped, 1);
    assert_eq!(report.text_drawn, 1);
    assert_eq!(report.pages_changed, vec![1]);

    let out = Document::load(ws.output()).unwrap();
    let content = overlay_content(&out, page_ids(&out)[1]);
    assert!(content.contains("100 730 Td"), "{content}");
    assert!(!content.contains("(No size)"), "{content}");
}

#[test]
fn test_failing_signature_leaves_pages_intact() {
    let ws = Workspace::new();
    let source = PdfDocument::from_file(ws.config.document.clone().unwrap()).unwrap();
    let image = SignatureImage::from_file(ws.config.signature.path.as_deref().unwrap()).unwrap();
    // A zero scale leaves nothing to draw
    let stamp = SignatureStamp::new(image, Point::new(900.0, 1400.0), 0.0);
    let overlays = OverlayMap::from([(
        0,
        PageOverlaySet {
            page_num: 0,
            text_boxes: vec![approved_record()],
            timestamp: String::new(),
        },
    )]);

    let (bytes, report) = Flattener::from_config(&ws.config)
        .flatten(&source, &overlays, Some(&stamp), None)
        .unwrap();
    assert!(!report.signature_drawn);
    assert_eq!(report.text_drawn, 1);
    assert_eq!(report.pages_changed, vec![0]);

    let fixture = Document::load_mem(&fixture_pdf(PAGES)).unwrap();
    let out = Document::load_mem(&bytes).unwrap();
    let (src_ids, out_ids) = (page_ids(&fixture), page_ids(&out));
    assert_eq!(out_ids.len(), PAGES);
    assert!(overlay_content(&out, out_ids[0]).contains("100 730 Td"));
    for page in 1..PAGES {
        assert_eq!(
            fixture.get_page_content(src_ids[page]).unwrap(),
            out.get_page_content(out_ids[page]).unwrap()
        );
    }
}

#[test]
fn test_session_export_includes_unsaved_page() {
    let ws = Workspace::new();
    let mut session = ws.session();
    session.run_idle();
    session.add_text_box(None, "Signed in Lisbon");

    let progress = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = progress.clone();
    let report = session
        .export(
            &ws.output(),
            false,
            Some(Box::new(move |done: usize, _: usize| {
                seen.store(done, std::sync::atomic::Ordering::SeqCst);
            })),
        )
        .unwrap();

    assert_eq!(progress.load(std::sync::atomic::Ordering::SeqCst), PAGES);
    assert_eq!(report.text_drawn, 1);
    assert!(report.signature_drawn);
    assert_eq!(ws.signer().stores().overlays.load_page(PAGES - 1).len(), 1);
}

#[test]
fn test_flatten_refuses_to_overwrite_source() {
    let ws = Workspace::new();
    let source = ws.config.document.clone().unwrap();
    let err = ws.signer().flatten(&source, false, None).unwrap_err();
    assert!(matches!(err, Error::OutputIsSource(_)));
    assert_eq!(std::fs::read(&source).unwrap(), fixture_pdf(PAGES));
}

#[test]
fn test_output_path_defaults_beside_input() {
    let ws = Workspace::new();
    let expected: &Path = &ws.output();
    assert_eq!(ws.config.output_path().unwrap(), expected);
}
