//! Multi-format loading: PDF, Office, CSV, and JSON through the loader and
//! the full pipeline.

mod common;

use std::fs;
use std::io::Write;
use std::sync::Arc;

use common::*;
use tempfile::TempDir;
use voxrag::config::LoaderConfig;
use voxrag::loader::{load_documents, load_file};
use voxrag_core::chunk::{chunk_document, ChunkingConfig};
use voxrag_core::models::{
    ContentKind, DataSource, DataSourceDescriptor, DataSourceKind, DataSourceStatus,
};
use voxrag_core::RagError;

/// Minimal valid PDF containing the text "pdf test phrase".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 47 >> stream\nBT /F1 12 Tf 100 700 Td (pdf test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Zip archive with the given `(entry name, contents)` pairs.
fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    zip_with(&[(
        "word/document.xml",
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        ),
    )])
}

fn slide(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><p:sld xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\" xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
        text
    )
}

fn minimal_pptx() -> Vec<u8> {
    // Entry order is deliberately not slide order.
    zip_with(&[
        ("ppt/slides/slide10.xml", slide("Closing remarks")),
        ("ppt/slides/slide2.xml", slide("Roadmap review")),
        ("ppt/slides/slide1.xml", slide("Kickoff agenda")),
    ])
}

fn minimal_xlsx() -> Vec<u8> {
    zip_with(&[
        (
            "xl/sharedStrings.xml",
            r#"<?xml version="1.0"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Name</t></si><si><t>Sarah Chen</t></si></sst>"#.to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<?xml version="1.0"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Age</t></is></c></row><row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>41</v></c></row></sheetData></worksheet>"#.to_string(),
        ),
    ])
}

fn directory_source(path: &std::path::Path) -> DataSource {
    DataSource::from_descriptor(
        "ds-1".into(),
        DataSourceDescriptor {
            name: "files".into(),
            kind: DataSourceKind::Directory,
            location: path.display().to_string(),
            credentials: Default::default(),
        },
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Single files
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn pdf_text_is_extracted() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("brief.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    assert_eq!(doc.content_kind, ContentKind::Pdf);
    assert!(doc.text.contains("pdf test phrase"), "got: {:?}", doc.text);
    assert_eq!(doc.source, "brief.pdf");
}

#[test]
fn docx_paragraphs_become_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memo.docx");
    fs::write(&path, minimal_docx(&["Team roster", "Sarah Chen &amp; Mark Lee"])).unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    assert_eq!(doc.content_kind, ContentKind::Docx);
    assert_eq!(doc.text, "Team roster\nSarah Chen & Mark Lee");
}

#[test]
fn pptx_slides_are_in_numeric_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("deck.pptx");
    fs::write(&path, minimal_pptx()).unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    assert_eq!(
        doc.text,
        "Kickoff agenda\n\nRoadmap review\n\nClosing remarks"
    );
}

#[test]
fn xlsx_rows_resolve_shared_strings() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("staff.xlsx");
    fs::write(&path, minimal_xlsx()).unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    assert_eq!(doc.text, "Name Age\nSarah Chen 41");
}

#[test]
fn csv_rows_are_labelled_with_headers() {
    let tmp = TempDir::new().unwrap();
    let path = people_csv(tmp.path());

    let doc = load_file("ds-1", &path).unwrap();
    assert_eq!(doc.content_kind, ContentKind::Csv);
    assert!(doc
        .text
        .starts_with("Row 1: name: Sarah Chen, role: Engineer\n"));
}

#[test]
fn csv_chunk_rows_match_row_labels_across_blank_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("staff.csv");
    fs::write(
        &path,
        "name,role\nSarah Chen,Engineer\n,\nWei Zhang,Designer\n , \nPriya Patel,Manager\n",
    )
    .unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    let config = ChunkingConfig {
        tabular_rows_per_chunk: 1,
        ..Default::default()
    };
    let chunks = chunk_document(&doc, &config);
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        let start_row = chunk.metadata["start_row"].as_u64().unwrap();
        assert!(
            chunk.text.starts_with(&format!("Row {}:", start_row)),
            "start_row {} for {:?}",
            start_row,
            chunk.text
        );
    }
    assert!(chunks[2].text.contains("Priya Patel"));
}

#[test]
fn json_is_flattened() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("team.json");
    fs::write(&path, r#"{"lead": {"name": "Sarah Chen"}, "tags": ["infra"]}"#).unwrap();

    let doc = load_file("ds-1", &path).unwrap();
    assert!(doc.text.contains("lead.name: Sarah Chen"));
    assert!(doc.text.contains("tags[0]: infra"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("photo.png");
    fs::write(&path, [0u8; 8]).unwrap();

    let err = load_file("ds-1", &path).unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(ext) if ext == "png"));
}

#[test]
fn corrupt_office_file_is_an_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.xlsx");
    fs::write(&path, "definitely not a zip").unwrap();

    let err = load_file("ds-1", &path).unwrap_err();
    assert!(matches!(err, RagError::Extraction { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Directories
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn directory_walk_is_sorted_and_skips_noise() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();

    fs::write(root.join("b.md"), "# B").unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("nested/c.csv"), "k\nv\n").unwrap();
    fs::write(root.join(".hidden.md"), "hidden").unwrap();
    fs::write(root.join(".git/config.txt"), "git").unwrap();
    fs::write(root.join("node_modules/pkg/readme.md"), "dep").unwrap();
    fs::write(root.join("image.png"), [0u8; 4]).unwrap();
    fs::write(root.join("bad.pdf"), "not a pdf").unwrap();

    let docs = load_documents(&directory_source(root), &LoaderConfig::default()).unwrap();
    let names: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.md", "c.csv"]);
    assert!(docs.iter().all(|d| d.data_source_id == "ds-1"));
}

#[test]
fn directory_skips_files_over_the_size_limit() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("small.txt"), "tiny").unwrap();
    fs::write(tmp.path().join("large.txt"), "x".repeat(4096)).unwrap();

    let config = LoaderConfig {
        max_file_bytes: Some(1024),
        ..LoaderConfig::default()
    };
    let docs = load_documents(&directory_source(tmp.path()), &config).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source, "small.txt");
}

#[test]
fn relative_locations_resolve_against_upload_dir() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("uploads")).unwrap();
    fs::write(tmp.path().join("uploads/notes.md"), "# Notes").unwrap();

    let source = DataSource::from_descriptor(
        "ds-2".into(),
        DataSourceDescriptor {
            name: "notes".into(),
            kind: DataSourceKind::File,
            location: "notes.md".into(),
            credentials: Default::default(),
        },
    );
    let config = LoaderConfig {
        upload_dir: Some(tmp.path().join("uploads")),
        ..LoaderConfig::default()
    };
    let docs = load_documents(&source, &config).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content_kind, ContentKind::Markdown);
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = load_documents(
        &directory_source(&tmp.path().join("gone")),
        &LoaderConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
}

#[tokio::test]
async fn mixed_formats_are_retrievable() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("deck.pptx"), minimal_pptx()).unwrap();
    fs::write(tmp.path().join("memo.docx"), minimal_docx(&["Budget freeze until March"])).unwrap();
    fs::write(tmp.path().join("staff.xlsx"), minimal_xlsx()).unwrap();

    let h = open_with(test_config(), Arc::new(VocabProvider::new())).await;
    let source =
        add_and_settle(&h.service, descriptor("office", DataSourceKind::Directory, tmp.path())).await;
    assert_eq!(source.status, DataSourceStatus::Ready);
    assert_eq!(source.document_count, 3);

    let store = h.service.vector_store_for_source(&source.id).unwrap();
    let results = h.service.retrieve_context("budget freeze", &store.id).await;
    assert_eq!(results[0].source, "memo.docx");
}
