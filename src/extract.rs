//! Plain-text extraction for the supported document formats.
//!
//! | Extension | Method |
//! |-----------|--------|
//! | `.txt`, `.md` | UTF-8 read |
//! | `.docx` | `word/document.xml` from the zip, paragraphs joined by blank lines |
//! | `.pdf` | `pdf-extract` |
//!
//! Anything else is [`ExtractError::Unsupported`]. Extraction never panics
//! on malformed input.

use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "docx", "pdf"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported file format: {0} (supported: .txt, .md, .docx, .pdf)")]
    Unsupported(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Lowercased extension of `path`, if any.
fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Whether `path` has an extension [`load_text`] can handle.
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Read the document at `path` and return its text.
pub fn load_text(path: &Path) -> Result<String, ExtractError> {
    if !path.is_file() {
        return Err(ExtractError::NotFound(path.display().to_string()));
    }
    let ext = extension(path).unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => {
            let bytes = std::fs::read(path)?;
            String::from_utf8(bytes).map_err(|e| ExtractError::Encoding(e.to_string()))
        }
        "docx" => extract_docx(&std::fs::read(path)?),
        "pdf" => extract_pdf(&std::fs::read(path)?),
        _ => Err(ExtractError::Unsupported(path.display().to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n\n"))
}

/// Collect the text of each non-empty `<w:p>` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => current.push('\n'),
                b"tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs)
}
