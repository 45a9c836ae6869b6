//! File ingestion: extract → chunk → split report → embed and store.
//!
//! The source identifier of a file is its path as given (or as found while
//! walking a directory). Already-ingested sources are skipped before the
//! file is read.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use tutor_rag_core::chunk::TextSplitter;

use crate::extract::{is_supported, load_text};
use crate::vector_store::{IngestOutcome, SkipReason, VectorStore};

/// The result of ingesting one file.
#[derive(Debug)]
pub struct FileIngest {
    pub path: PathBuf,
    pub source: String,
    pub outcome: IngestOutcome,
}

/// Ingest a file, or every supported file under a directory in path order,
/// into `partition`.
pub async fn ingest_path(
    store: &mut VectorStore,
    splitter: &TextSplitter,
    path: &Path,
    partition: &str,
    report_dir: Option<&Path>,
) -> Vec<FileIngest> {
    let files = if path.is_dir() {
        collect_files(path)
    } else {
        vec![path.to_path_buf()]
    };
    if files.is_empty() {
        tracing::warn!(path = %path.display(), "no supported documents found");
    }

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let outcome = ingest_file(store, splitter, &file, partition, report_dir).await;
        results.push(FileIngest {
            source: file.display().to_string(),
            path: file,
            outcome,
        });
    }
    results
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

async fn ingest_file(
    store: &mut VectorStore,
    splitter: &TextSplitter,
    path: &Path,
    partition: &str,
    report_dir: Option<&Path>,
) -> IngestOutcome {
    let source = path.display().to_string();
    if store.is_loaded(&source) {
        tracing::info!(source = %source, "document already ingested, skipping");
        return IngestOutcome::Skipped(SkipReason::AlreadyIngested);
    }

    let text = match load_text(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(source = %source, "failed to load document: {}", e);
            return IngestOutcome::Failed(e.into());
        }
    };

    let chunks = splitter.split(&text);
    tracing::info!(source = %source, chunks = chunks.len(), "split document");

    if let Some(dir) = report_dir {
        match write_split_report(dir, &source, &chunks) {
            Ok(report) => tracing::debug!(report = %report.display(), "wrote split report"),
            Err(e) => tracing::warn!(source = %source, "failed to write split report: {:#}", e),
        }
    }

    store.ingest(chunks, &source, partition).await
}

/// Write `<stem>_splits.txt` into `dir` describing each chunk.
pub fn write_split_report(dir: &Path, source: &str, chunks: &[String]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let path = dir.join(format!("{}_splits.txt", stem));

    let total_chars: usize = chunks.iter().map(|c| c.chars().count()).sum();
    let mut report = String::new();
    let _ = writeln!(report, "Document: {}", source);
    let _ = writeln!(report, "Total characters: {}", total_chars);
    let _ = writeln!(report, "Total chunks: {}\n", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(report, "=== Chunk {} ===", i + 1);
        let _ = writeln!(report, "Length: {} characters", chunk.chars().count());
        let _ = writeln!(report, "Content:\n{}", chunk);
        let _ = writeln!(report, "{}\n", "=".repeat(50));
    }

    std::fs::write(&path, report).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
