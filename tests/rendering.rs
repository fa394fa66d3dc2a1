use htmltopdf_testcases::builder::PdfRendererBuilder;
use htmltopdf_testcases::runner::default_drawer_factory;
use htmltopdf_testcases::{fonts, logging};
use log::LevelFilter;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const SAMPLE: &str = r#"<html><head><title>Sample</title></head><body>
<h1>Sample</h1>
<p>Hello, <b>PDF</b>!</p>
<object type="custom/binary-tree" data-depth="4" data-fanout="2" data-angle="30"
        style="width: 120px; height: 120px"></object>
</body></html>"#;

fn render_sample_pdf() -> Option<Vec<u8>> {
    if !fonts::default_fonts_available() {
        return None;
    }

    let mut bytes = Vec::new();
    PdfRendererBuilder::new()
        .use_object_drawer_factory(Arc::new(default_drawer_factory()))
        .with_html_content(SAMPLE, "file:///")
        .to_stream(&mut bytes)
        .run()
        .expect("render sample pdf");

    Some(bytes)
}

/// Markers around values that change between runs: timestamps, producer and document ids.
const VOLATILE: &[(&[u8], &[u8])] = &[
    (b"/CreationDate(", b")"),
    (b"/ModDate(", b")"),
    (b"/Producer(", b")"),
    (b"/ID[", b"]"),
    (b"<xmp:CreateDate>", b"</"),
    (b"<xmp:ModifyDate>", b"</"),
    (b"<xmp:MetadataDate>", b"</"),
    (b"<xmpMM:DocumentID>", b"</"),
    (b"<xmpMM:InstanceID>", b"</"),
    (b"<xmpMM:VersionID>", b"</"),
];

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| from + position)
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    let mut normalized = bytes.to_vec();
    for (open, close) in VOLATILE {
        let mut cursor = 0;
        while let Some(start) = find(&normalized, open, cursor) {
            let value_start = start + open.len();
            let Some(value_end) = find(&normalized, close, value_start) else {
                break;
            };
            for byte in &mut normalized[value_start..value_end] {
                if byte.is_ascii_alphanumeric() {
                    *byte = b'0';
                }
            }
            cursor = value_end + close.len();
        }
    }
    Sha256::digest(&normalized).into()
}

const FONTS_MISSING: &str =
    "bundled fonts missing. Set TESTCASES_FONTS_DIR or copy assets/fonts next to the binary.";

#[test]
fn renders_non_empty_output() {
    let Some(bytes) = render_sample_pdf() else {
        eprintln!("Skipping renders_non_empty_output: {FONTS_MISSING}");
        return;
    };
    assert!(bytes.starts_with(b"%PDF"), "rendered PDF should start with a header");
}

#[test]
fn rendering_is_deterministic() {
    let (Some(first), Some(second)) = (render_sample_pdf(), render_sample_pdf()) else {
        eprintln!("Skipping rendering_is_deterministic: {FONTS_MISSING}");
        return;
    };
    assert_eq!(first.len(), second.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&first),
        normalized_hash(&second),
        "renders differ after masking timestamps and ids"
    );
}

#[test]
fn sample_renders_without_warnings() {
    if logging::install(LevelFilter::Off).is_err() {
        return;
    }
    let (bytes, warnings) = logging::capture_warnings(render_sample_pdf);
    let Some(bytes) = bytes else {
        eprintln!("Skipping sample_renders_without_warnings: {FONTS_MISSING}");
        return;
    };
    assert!(bytes.starts_with(b"%PDF"));
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[cfg(feature = "bookmarks")]
#[test]
fn headings_become_outline_entries() {
    if !fonts::default_fonts_available() {
        eprintln!("Skipping headings_become_outline_entries: {FONTS_MISSING}");
        return;
    }
    let mut bytes = Vec::new();
    PdfRendererBuilder::new()
        .with_html_content(
            "<h1>Intro</h1><p>a</p><h2>Scope</h2><p>b</p><h4>Too deep</h4>",
            "file:///",
        )
        .with_bookmarks(true)
        .to_stream(&mut bytes)
        .run()
        .expect("render with bookmarks");

    let document = lopdf::Document::load_mem(&bytes).expect("reload");
    let catalog = document.catalog().expect("catalog");
    let outlines = catalog
        .get(b"Outlines")
        .and_then(lopdf::Object::as_reference)
        .and_then(|id| document.get_dictionary(id))
        .expect("outline root");
    assert_eq!(outlines.get(b"Count").and_then(lopdf::Object::as_i64).ok(), Some(2));
}
