//! Multi-format document reader
//!
//! Each format reader is a pure function from a local file to an ordered
//! list of text units (one per page/row/slide). Read failures propagate;
//! the pipeline decides whether a failure is fatal.

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::DocFormat;

/// Read a document into an ordered list of text units.
///
/// Format is inferred from the document name's extension. Unrecognized
/// extensions yield [`Error::UnsupportedFormat`].
pub fn read_document(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let format = DocFormat::from_name(doc_name)
        .ok_or_else(|| Error::UnsupportedFormat(doc_name.to_string()))?;

    match format {
        DocFormat::Text | DocFormat::Html => read_whole_file(doc_name, path),
        DocFormat::Csv => read_csv(doc_name, path),
        DocFormat::Pdf => read_pdf(doc_name, path),
        DocFormat::Docx => read_docx(doc_name, path),
        DocFormat::Slides => read_slides(doc_name, path),
    }
}

/// Plain text and HTML: the whole file is one unit. HTML markup is left
/// intact here; stripping it belongs to the markup-aware normalizer.
fn read_whole_file(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::document_read(doc_name, e.to_string()))?;
    Ok(vec![text])
}

/// CSV: each row becomes one unit of `header: value | header: value` text
fn read_csv(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::document_read(doc_name, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::document_read(doc_name, e.to_string()))?
        .clone();

    let mut units = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::document_read(doc_name, e.to_string()))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header, value))
            .collect::<Vec<_>>()
            .join(" | ");
        units.push(row);
    }

    Ok(units)
}

/// PDF: one unit per page. A page that fails extraction yields an empty
/// string rather than aborting the document.
fn read_pdf(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read(path).map_err(|e| Error::document_read(doc_name, e.to_string()))?;

    match pdf_extract::extract_text_from_mem_by_pages(&data) {
        Ok(pages) => {
            tracing::debug!("read {} pdf pages from {}", pages.len(), doc_name);
            Ok(pages)
        }
        Err(e) => {
            tracing::warn!("pdf extraction failed for {}: {}, trying fallback", doc_name, e);
            read_pdf_fallback(doc_name, &data)
        }
    }
}

/// Fallback PDF path walking pages individually with lopdf
fn read_pdf_fallback(doc_name: &str, data: &[u8]) -> Result<Vec<String>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::document_read(doc_name, e.to_string()))?;

    let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut units = Vec::with_capacity(page_numbers.len());
    for page in page_numbers {
        match doc.extract_text(&[page]) {
            Ok(text) => units.push(text),
            Err(e) => {
                tracing::warn!("page {} of {} failed extraction: {}", page, doc_name, e);
                units.push(String::new());
            }
        }
    }

    Ok(units)
}

/// DOCX: the document body is one unit
fn read_docx(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read(path).map_err(|e| Error::document_read(doc_name, e.to_string()))?;
    let docx =
        docx_rs::read_docx(&data).map_err(|e| Error::document_read(doc_name, e.to_string()))?;

    let mut body = String::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(text) = child {
                            body.push_str(&text.text);
                        }
                    }
                }
            }
            body.push('\n');
        }
    }

    Ok(vec![body])
}

/// Slide decks: one unit per slide, extracted from the XML parts
fn read_slides(doc_name: &str, path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| Error::document_read(doc_name, e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::document_read(doc_name, e.to_string()))?;

    // slides are stored as ppt/slides/slide<N>.xml; order by N
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(0)
    });

    let mut units = Vec::with_capacity(slide_names.len());
    for slide_name in slide_names {
        let mut entry = archive
            .by_name(&slide_name)
            .map_err(|e| Error::document_read(doc_name, e.to_string()))?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| Error::document_read(doc_name, e.to_string()))?;
        units.push(slide_text(&xml));
    }

    Ok(units)
}

/// Extract visible text runs (`<a:t>` elements) from slide XML
fn slide_text(xml: &str) -> String {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parts: Vec<String> = Vec::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => {
                in_text_element = true;
            }
            Ok(Event::Text(e)) if in_text_element => {
                if let Ok(text) = e.unescape() {
                    let trimmed = text.trim().to_string();
                    if !trimmed.is_empty() {
                        parts.push(trimmed);
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => {
                in_text_element = false;
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    parts.join(" ")
}
