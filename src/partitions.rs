//! Named partitions ("teachers") that scope ingestion and retrieval.
//!
//! The registry is an ordered set of names persisted as
//! `{"partitions": [...]}` and rewritten whole on every mutation. Files
//! written by older versions under the `"teachers"` key still load.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tutor_rag_core::store::IndexStore;

use crate::persist::{read_json, write_json_atomic};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default, alias = "teachers")]
    partitions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    /// Guarded removal refused: the partition still tags index entries.
    InUse { entries: usize },
}

/// One row of [`PartitionRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionListing {
    /// 1-based position, as accepted by [`PartitionRegistry::select`].
    pub position: usize,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Default)]
pub struct PartitionRegistry {
    path: Option<PathBuf>,
    names: Vec<String>,
    current: Option<String>,
}

impl PartitionRegistry {
    /// Load from `path`. A missing file is an empty registry; an unreadable
    /// one is too, with a warning.
    pub fn load(path: &Path) -> Self {
        let names = match read_json::<RegistryFile>(path) {
            Ok(Some(file)) => file.partitions,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load partitions: {:#}", e);
                Vec::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            names,
            current: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str) -> Result<AddOutcome> {
        let name = validate_name(name)?;
        if self.contains(name) {
            tracing::info!(partition = name, "partition already exists");
            return Ok(AddOutcome::AlreadyPresent);
        }
        let mut names = self.names.clone();
        names.push(name.to_string());
        self.save(&names)?;
        self.names = names;
        tracing::info!(partition = name, "added partition");
        Ok(AddOutcome::Added)
    }

    /// Remove `name` from the registry. Entries tagged with it stay in the
    /// index; see [`remove_partition`] for the guarded variant.
    pub fn remove(&mut self, name: &str) -> Result<RemoveOutcome> {
        let name = validate_name(name)?;
        let Some(pos) = self.names.iter().position(|n| n == name) else {
            tracing::info!(partition = name, "partition not found");
            return Ok(RemoveOutcome::NotFound);
        };
        let mut names = self.names.clone();
        names.remove(pos);
        self.save(&names)?;
        self.names = names;
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        tracing::info!(partition = name, "removed partition");
        Ok(RemoveOutcome::Removed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn list(&self) -> Vec<PartitionListing> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| PartitionListing {
                position: i + 1,
                name: name.clone(),
                selected: self.current.as_deref() == Some(name.as_str()),
            })
            .collect()
    }

    /// Select by 1-based position. Out of range (including 0) selects nothing.
    pub fn select(&mut self, position: usize) -> Option<String> {
        let name = self.names.get(position.checked_sub(1)?)?.clone();
        self.current = Some(name.clone());
        Some(name)
    }

    pub fn select_by_name(&mut self, name: &str) -> Option<String> {
        let name = self.names.iter().find(|n| *n == name)?.clone();
        self.current = Some(name.clone());
        Some(name)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn clear_selection(&mut self) {
        self.current = None;
    }

    /// Write `names` to disk. Callers commit to `self.names` only after
    /// this succeeds, so memory never runs ahead of the file.
    fn save(&self, names: &[String]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = RegistryFile {
            partitions: names.to_vec(),
        };
        write_json_atomic(path, &file)
    }
}

/// Names match exactly, so surrounding whitespace is rejected rather than
/// trimmed away.
fn validate_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        bail!("partition name must not be empty");
    }
    if name.trim() != name {
        bail!("partition name '{}' has leading or trailing whitespace", name);
    }
    Ok(name)
}

/// Remove a partition only if no index entry is tagged with it.
pub async fn remove_partition<S: IndexStore + ?Sized>(
    registry: &mut PartitionRegistry,
    store: &S,
    name: &str,
) -> Result<RemoveOutcome> {
    let name = validate_name(name)?;
    if registry.contains(name) {
        let entries = store.count(Some(name)).await?;
        if entries > 0 {
            tracing::warn!(partition = name, entries, "partition still has indexed segments");
            return Ok(RemoveOutcome::InUse { entries });
        }
    }
    registry.remove(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tutor_rag_core::models::{IndexEntry, Segment};
    use tutor_rag_core::store::memory::InMemoryIndex;

    #[test]
    fn test_add_persists_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partitions.json");

        let mut registry = PartitionRegistry::load(&path);
        assert_eq!(registry.add("李老师").unwrap(), AddOutcome::Added);
        assert_eq!(registry.add("王老师").unwrap(), AddOutcome::Added);
        assert_eq!(registry.add("李老师").unwrap(), AddOutcome::AlreadyPresent);

        let reloaded = PartitionRegistry::load(&path);
        assert_eq!(reloaded.names(), &["李老师".to_string(), "王老师".to_string()]);

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["partitions"][1], "王老师");
    }

    #[test]
    fn test_legacy_key_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partitions.json");
        std::fs::write(&path, r#"{"teachers": ["Ms. Li"]}"#).unwrap();
        assert_eq!(PartitionRegistry::load(&path).names(), &["Ms. Li".to_string()]);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partitions.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(PartitionRegistry::load(&path).is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = PartitionRegistry::in_memory();
        assert!(registry.add("   ").is_err());
        assert!(registry.remove("").is_err());
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        let mut registry = PartitionRegistry::in_memory();
        registry.add("A").unwrap();
        assert!(registry.add(" A").is_err());
        assert!(registry.add("A\t").is_err());
        assert!(registry.remove(" A").is_err());
        assert_eq!(registry.add("Ms. Li").unwrap(), AddOutcome::Added);
        assert_eq!(registry.names(), &["A".to_string(), "Ms. Li".to_string()]);
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("partitions.json");

        let mut registry = PartitionRegistry::load(&path);
        assert!(registry.add("A").is_err());
        assert!(!registry.contains("A"));
        assert!(registry.add("A").is_err());
        assert!(registry.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_save_keeps_removed_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partitions.json");
        let mut registry = PartitionRegistry::load(&path);
        registry.add("A").unwrap();
        registry.select(1);

        // Point the registry at an unwritable location.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        registry.path = Some(blocker.join("partitions.json"));

        assert!(registry.remove("A").is_err());
        assert!(registry.contains("A"));
        assert_eq!(registry.current(), Some("A"));
    }

    #[test]
    fn test_remove_and_selection() {
        let mut registry = PartitionRegistry::in_memory();
        registry.add("A").unwrap();
        registry.add("B").unwrap();

        assert_eq!(registry.select(2), Some("B".to_string()));
        assert_eq!(registry.select(0), None);
        assert_eq!(registry.select(3), None);
        assert_eq!(registry.current(), Some("B"));

        let listing = registry.list();
        assert!(!listing[0].selected);
        assert!(listing[1].selected);
        assert_eq!(listing[1].position, 2);

        assert_eq!(registry.remove("B").unwrap(), RemoveOutcome::Removed);
        assert_eq!(registry.current(), None);
        assert_eq!(registry.remove("B").unwrap(), RemoveOutcome::NotFound);
        assert_eq!(registry.select_by_name("A"), Some("A".to_string()));
    }

    #[tokio::test]
    async fn test_guarded_remove_refuses_when_in_use() {
        let index = InMemoryIndex::new();
        index
            .append(&[IndexEntry::new(Segment::new("x", "a.txt", "T1"), vec![1.0])])
            .await
            .unwrap();

        let mut registry = PartitionRegistry::in_memory();
        registry.add("T1").unwrap();
        registry.add("T2").unwrap();

        let outcome = remove_partition(&mut registry, &index, "T1").await.unwrap();
        assert_eq!(outcome, RemoveOutcome::InUse { entries: 1 });
        assert!(registry.contains("T1"));

        let outcome = remove_partition(&mut registry, &index, "T2").await.unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
    }
}
