//! In-memory [`IndexStore`] implementation for tests and ephemeral use.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`; nearest-neighbour
//! search is the brute-force default from the trait.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::IndexEntry;

use super::IndexStore;

/// Non-persistent index.
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

fn matches(entry: &IndexEntry, partition: Option<&str>) -> bool {
    partition.map_or(true, |p| entry.segment.partition() == p)
}

#[async_trait]
impl IndexStore for InMemoryIndex {
    async fn append(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        stored.extend_from_slice(entries);
        Ok(())
    }

    async fn entries(&self, partition: Option<&str>) -> Result<Vec<IndexEntry>> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(stored
            .iter()
            .filter(|e| matches(e, partition))
            .cloned()
            .collect())
    }

    async fn count(&self, partition: Option<&str>) -> Result<usize> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(stored.iter().filter(|e| matches(e, partition)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Metric;
    use crate::models::Segment;

    fn entry(content: &str, partition: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(Segment::new(content, "doc.txt", partition), vector)
    }

    #[tokio::test]
    async fn test_append_and_filter_by_partition() {
        let index = InMemoryIndex::new();
        index
            .append(&[
                entry("a", "T1", vec![1.0, 0.0]),
                entry("b", "T2", vec![0.0, 1.0]),
                entry("c", "T1", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.count(None).await.unwrap(), 3);
        assert_eq!(index.count(Some("T1")).await.unwrap(), 2);
        assert_eq!(index.count(Some("t1")).await.unwrap(), 0);

        let t1: Vec<String> = index
            .entries(Some("T1"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.segment.content)
            .collect();
        assert_eq!(t1, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_nearest_respects_partition_and_k() {
        let index = InMemoryIndex::new();
        index
            .append(&[
                entry("near-b", "T2", vec![1.0, 0.0]),
                entry("far-a", "T1", vec![0.0, 1.0]),
                entry("near-a", "T1", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let hits = index
            .nearest(&[1.0, 0.0], 1, Some("T1"), Metric::L2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.segment.content, "near-a");
    }
}
