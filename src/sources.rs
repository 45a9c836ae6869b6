//! The registry of already-ingested sources (`loaded_documents.json`).
//!
//! A plain JSON array of source identifiers. It is loaded eagerly; an
//! unreadable or corrupt file degrades to an empty registry with a warning.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::persist::{read_json, write_json_atomic};

#[derive(Debug, Default)]
pub struct SourceRegistry {
    path: Option<PathBuf>,
    sources: Vec<String>,
}

impl SourceRegistry {
    pub fn load(path: &Path) -> Self {
        let sources = match read_json::<Vec<String>>(path) {
            Ok(Some(sources)) => sources,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load source registry: {:#}", e);
                Vec::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            sources,
        }
    }

    /// A registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    /// Record `source` and persist. Recording twice is a no-op.
    pub fn record(&mut self, source: &str) -> Result<()> {
        if self.contains(source) {
            return Ok(());
        }
        let mut sources = self.sources.clone();
        sources.push(source.to_string());
        self.save(&sources)?;
        self.sources = sources;
        Ok(())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn save(&self, sources: &[String]) -> Result<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, sources),
            None => Ok(()),
        }
    }
}

/// Print the registry as a table, as `rag sources` does.
pub fn print_sources(registry: &SourceRegistry) {
    if registry.is_empty() {
        println!("No documents have been ingested yet.");
        return;
    }
    println!("{:<5} SOURCE", "#");
    for (i, source) in registry.as_slice().iter().enumerate() {
        println!("{:<5} {}", i + 1, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_persists_and_reloads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("loaded_documents.json");

        let mut registry = SourceRegistry::load(&path);
        assert!(registry.is_empty());
        registry.record("a.txt").unwrap();
        registry.record("b.pdf").unwrap();
        registry.record("a.txt").unwrap();

        let reloaded = SourceRegistry::load(&path);
        assert_eq!(reloaded.as_slice(), &["a.txt".to_string(), "b.pdf".to_string()]);
        assert!(reloaded.contains("b.pdf"));
        assert!(!reloaded.contains("B.pdf"));
    }

    #[test]
    fn test_failed_record_is_not_remembered() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut registry = SourceRegistry::load(&blocker.join("loaded_documents.json"));
        assert!(registry.record("a.txt").is_err());
        assert!(!registry.contains("a.txt"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("loaded_documents.json");
        std::fs::write(&path, "[\"a.txt\"").unwrap();
        assert!(SourceRegistry::load(&path).is_empty());
    }
}
