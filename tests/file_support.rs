//! Text extraction across the supported document formats.

mod common;

use std::io::Write;
use tempfile::TempDir;

use tutor_rag::extract::{load_text, ExtractError};
use tutor_rag::ingest::ingest_path;
use tutor_rag::vector_store::{IngestOutcome, VectorStore};

use common::{test_config, FakeEmbedder};

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_txt_and_md_read_verbatim() {
    let tmp = TempDir::new().unwrap();
    let txt = tmp.path().join("notes.txt");
    std::fs::write(&txt, "第一行\n第二行").unwrap();
    assert_eq!(load_text(&txt).unwrap(), "第一行\n第二行");

    let md = tmp.path().join("README.MD");
    std::fs::write(&md, "# Title\n\nBody").unwrap();
    assert_eq!(load_text(&md).unwrap(), "# Title\n\nBody");
}

#[test]
fn test_docx_paragraphs_separated_by_blank_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("lesson.docx");
    std::fs::write(&path, minimal_docx(&["Chapter one", "Cells &amp; tissues"])).unwrap();
    assert_eq!(load_text(&path).unwrap(), "Chapter one\n\nCells & tissues");
}

#[test]
fn test_unsupported_and_missing() {
    let tmp = TempDir::new().unwrap();
    let pptx = tmp.path().join("slides.pptx");
    std::fs::write(&pptx, "x").unwrap();
    assert!(matches!(load_text(&pptx), Err(ExtractError::Unsupported(_))));

    let missing = tmp.path().join("gone.txt");
    assert!(matches!(load_text(&missing), Err(ExtractError::NotFound(_))));
}

#[test]
fn test_invalid_utf8_txt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("latin1.txt");
    std::fs::write(&path, [0xff, 0xfe, 0x41]).unwrap();
    assert!(matches!(load_text(&path), Err(ExtractError::Encoding(_))));
}

#[tokio::test]
async fn test_directory_ingest_reports_each_file() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let splitter = config.chunking.splitter().unwrap();
    let mut store = VectorStore::open(&config, Box::new(FakeEmbedder)).unwrap();

    let docs = tmp.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("a.txt"), "Alpha notes.").unwrap();
    std::fs::write(docs.join("b.docx"), minimal_docx(&["Beta notes."])).unwrap();
    std::fs::write(docs.join("c.docx"), b"corrupt").unwrap();
    std::fs::write(docs.join("ignored.png"), b"png").unwrap();

    let results = ingest_path(&mut store, &splitter, &docs, "T", None).await;
    assert_eq!(results.len(), 3);
    assert!(matches!(results[0].outcome, IngestOutcome::Ingested { segments: 1, .. }));
    assert!(matches!(results[1].outcome, IngestOutcome::Ingested { segments: 1, .. }));
    assert!(results[2].outcome.is_failed());

    assert_eq!(store.count(Some("T")).await, 2);
    assert!(!store.is_loaded(&results[2].source));
}
