//! Export indexed segments to plain-text files grouped by source.
//!
//! Layout under the export root:
//!
//! ```text
//! exported_segments/
//!   lecture1/
//!     segment_001.txt
//!     segment_002.txt
//!   unknown_source/
//!     segment_001.txt
//! ```
//!
//! Each file holds a short header followed by the segment content verbatim.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tutor_rag_core::models::IndexEntry;

/// Bucket name for entries without a source.
pub const UNKNOWN_SOURCE: &str = "unknown_source";

/// One exported source directory.
#[derive(Debug, Clone)]
pub struct ExportedGroup {
    pub source: String,
    pub dir: PathBuf,
    pub segments: usize,
}

/// Write `entries` under `root`, one directory per source, in first-seen
/// source order. An existing directory for a group is cleared first so
/// stale segment files never linger.
pub fn write_export(entries: &[IndexEntry], root: &Path) -> Result<Vec<ExportedGroup>> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create export directory: {}", root.display()))?;

    let mut groups: Vec<(String, Vec<&IndexEntry>)> = Vec::new();
    for entry in entries {
        let source = match entry.segment.source() {
            "" => UNKNOWN_SOURCE,
            s => s,
        };
        match groups.iter_mut().find(|(s, _)| s.as_str() == source) {
            Some((_, members)) => members.push(entry),
            None => groups.push((source.to_string(), vec![entry])),
        }
    }

    let mut used_dirs: HashSet<String> = HashSet::new();
    let mut exported = Vec::with_capacity(groups.len());

    for (source, members) in groups {
        let dir_name = unique_dir_name(&source_stem(&source), &mut used_dirs);
        let dir = root.join(&dir_name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        std::fs::create_dir_all(&dir)?;

        for (i, entry) in members.iter().enumerate() {
            let number = i + 1;
            let path = dir.join(format!("segment_{:03}.txt", number));
            std::fs::write(&path, render_segment(number, &source, entry))
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        tracing::info!(source = %source, segments = members.len(), dir = %dir.display(), "exported segments");
        exported.push(ExportedGroup {
            source,
            dir,
            segments: members.len(),
        });
    }

    Ok(exported)
}

/// File name without directories or extension.
fn source_stem(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        stem
    }
}

fn unique_dir_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", stem, n);
        n += 1;
    }
    candidate
}

fn render_segment(number: usize, source: &str, entry: &IndexEntry) -> String {
    let metadata = serde_json::to_string(&entry.segment.metadata).unwrap_or_default();
    format!(
        "=== Segment {} ===\nSource: {}\nMetadata: {}\n\nContent:\n{}\n{}\n",
        number,
        source,
        metadata,
        entry.segment.content,
        "=".repeat(50)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tutor_rag_core::models::Segment;

    fn entry(content: &str, source: &str) -> IndexEntry {
        IndexEntry::new(Segment::new(content, source, "T"), vec![0.0])
    }

    #[test]
    fn test_groups_by_source_with_numbered_files() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            entry("one", "docs/doc1.txt"),
            entry("alpha", "doc2.md"),
            entry("two", "docs/doc1.txt"),
            entry("three", "docs/doc1.txt"),
            entry("beta", "doc2.md"),
        ];
        let groups = write_export(&entries, tmp.path()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].segments, 3);
        assert_eq!(groups[1].segments, 2);

        let third = std::fs::read_to_string(tmp.path().join("doc1/segment_003.txt")).unwrap();
        assert!(third.starts_with("=== Segment 3 ===\nSource: docs/doc1.txt\n"));
        assert!(third.contains("\nContent:\nthree\n"));
        assert!(tmp.path().join("doc2/segment_002.txt").exists());
        assert!(!tmp.path().join("doc2/segment_003.txt").exists());
    }

    #[test]
    fn test_empty_source_and_stem_collisions() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            entry("a", "x/notes.txt"),
            entry("b", "y/notes.pdf"),
            entry("c", ""),
        ];
        let groups = write_export(&entries, tmp.path()).unwrap();
        let dirs: Vec<String> = groups
            .iter()
            .map(|g| g.dir.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(dirs, vec!["notes", "notes_2", "unknown_source"]);
    }

    #[test]
    fn test_reexport_clears_stale_files() {
        let tmp = TempDir::new().unwrap();
        write_export(&[entry("a", "d.txt"), entry("b", "d.txt")], tmp.path()).unwrap();
        write_export(&[entry("a", "d.txt")], tmp.path()).unwrap();
        assert!(!tmp.path().join("d/segment_002.txt").exists());
    }
}
