//! Text extraction for every supported [`ContentKind`].
//!
//! Extraction turns raw file bytes into one plain UTF-8 blob per file:
//!
//! | Kind | Output |
//! |------|--------|
//! | text, markdown | content as-is (lossy UTF-8) |
//! | pdf | `pdf_extract` text |
//! | docx, pptx | one line per paragraph, slides in order |
//! | xlsx | one line per row, cells space-separated, sheets in order |
//! | csv | one line per row: `Row N: col: value, col: value` |
//! | json | one line per leaf: `a.b[0].c: value` |
//!
//! CSV and JSON are textualized line-by-line so the tabular and structured
//! chunking strategies can split on row and key boundaries.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use thiserror::Error;
use voxrag_core::models::ContentKind;

/// Maximum sheets to read from an xlsx workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to read per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    fn ooxml<E: std::fmt::Display>(err: E) -> Self {
        ExtractError::Ooxml(err.to_string())
    }
}

/// Extract plain text from `bytes` according to `kind`.
pub fn extract_text(bytes: &[u8], kind: ContentKind) -> Result<String, ExtractError> {
    match kind {
        ContentKind::Text | ContentKind::Markdown => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        ContentKind::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        ContentKind::Docx => extract_docx(bytes),
        ContentKind::Pptx => extract_pptx(bytes),
        ContentKind::Xlsx => extract_xlsx(bytes),
        ContentKind::Csv => csv_to_text(bytes),
        ContentKind::Json => json_to_text(bytes),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tabular and structured text
// ═══════════════════════════════════════════════════════════════════════

/// Render each CSV record as `Row N: header: value, header: value`.
///
/// The first record is the header. Empty cells are omitted, extra cells
/// beyond the header are labelled `column_N`, and rows with no non-empty
/// cell produce no line. `N` counts emitted lines, so it matches the row
/// numbers the tabular chunker records.
pub fn csv_to_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_empty())
            .map(|(col, value)| match headers.get(col).filter(|h| !h.is_empty()) {
                Some(header) => format!("{}: {}", header, value),
                None => format!("column_{}: {}", col + 1, value),
            })
            .collect();
        if !cells.is_empty() {
            lines.push(format!("Row {}: {}", lines.len() + 1, cells.join(", ")));
        }
    }
    Ok(lines.join("\n"))
}

/// Flatten a JSON document into one `path: value` line per leaf.
///
/// Object keys join with `.`, array positions render as `[i]`, and string
/// leaves are written without quotes.
pub fn json_to_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let mut lines = Vec::new();
    flatten_json("", &value, &mut lines);
    Ok(lines.join("\n"))
}

fn flatten_json(path: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_json(&child_path, child, lines);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_json(&format!("{}[{}]", path, i), child, lines);
            }
        }
        leaf => {
            let rendered = match leaf {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if path.is_empty() {
                lines.push(rendered);
            } else {
                lines.push(format!("{}: {}", path, rendered));
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// OOXML
// ═══════════════════════════════════════════════════════════════════════

type ZipArchive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<ZipArchive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ExtractError::ooxml)
}

fn read_entry_bounded(archive: &mut ZipArchive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(|e| {
        ExtractError::Ooxml(format!("{}: {}", name, e))
    })?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ExtractError::ooxml)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Entry names under `prefix` ending in `.xml`, ordered by their numeric part.
fn numbered_entries(archive: &ZipArchive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    paragraph_text(&xml)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let text = paragraph_text(&xml)?;
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n\n"))
}

/// Collect `<*:t>` runs, breaking lines at the end of each `<*:p>`.
///
/// WordprocessingML (`w:`) and DrawingML (`a:`) share this shape, so docx
/// bodies and pptx slides go through the same walker.
fn paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                current.push_str(&te.unescape().map_err(ExtractError::ooxml)?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        paragraphs.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs.join("\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = if archive.index_for_name("xl/sharedStrings.xml").is_some() {
        shared_strings(&read_entry_bounded(&mut archive, "xl/sharedStrings.xml")?)?
    } else {
        Vec::new()
    };

    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let text = sheet_rows(&xml, &shared)?;
        if !text.is_empty() {
            sheets.push(text);
        }
    }
    Ok(sheets.join("\n\n"))
}

/// Each `<si>` entry concatenates all of its `<t>` runs (rich text).
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(ExtractError::ooxml)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Value,
}

/// One line per `<row>`; shared-string, inline-string, and literal values.
fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type = CellType::Value;
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_type = CellType::Value;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            cell_type = match attr.value.as_ref() {
                                b"s" => CellType::Shared,
                                b"inlineStr" => CellType::Inline,
                                _ => CellType::Value,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if cell_type == CellType::Inline => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().map_err(ExtractError::ooxml)?;
                let raw = raw.trim();
                let text = match cell_type {
                    CellType::Shared => raw
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared.get(i))
                        .cloned(),
                    CellType::Inline | CellType::Value => Some(raw.to_string()),
                };
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    row.push(text);
                    cell_count += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }

    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}
