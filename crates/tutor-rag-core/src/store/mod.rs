//! Index storage abstraction.
//!
//! The [`IndexStore`] trait is the seam between the retrieval algorithm
//! and a concrete backend (SQLite in the app crate, [`memory::InMemoryIndex`]
//! for tests). Entries are append-only: there is no update or delete.
//!
//! Implementations must return entries in insertion order so that ranking
//! ties resolve deterministically.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::Metric;
use crate::models::IndexEntry;
use crate::search::rank_nearest;

/// Abstract append-only embedding index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`append`](IndexStore::append) | Atomically add a batch of entries |
/// | [`entries`](IndexStore::entries) | All entries, optionally for one partition |
/// | [`count`](IndexStore::count) | Number of entries, optionally for one partition |
/// | [`nearest`](IndexStore::nearest) | Top-k entries by distance to a query vector |
/// | [`dimension`](IndexStore::dimension) | Vector length of the stored entries |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Append entries. Either all of them become visible or none do.
    async fn append(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Every stored entry in insertion order, restricted to an exact
    /// partition tag when one is given.
    async fn entries(&self, partition: Option<&str>) -> Result<Vec<IndexEntry>>;

    /// Number of stored entries, restricted to an exact partition tag when
    /// one is given.
    async fn count(&self, partition: Option<&str>) -> Result<usize>;

    /// Length of the stored vectors, taken from the first entry. `None`
    /// while the index is empty.
    async fn dimension(&self) -> Result<Option<usize>> {
        let entries = self.entries(None).await?;
        Ok(entries.first().map(|e| e.vector.len()))
    }

    /// The `k` entries closest to `query` under `metric`, with their
    /// distances, nearest first. Equal distances keep insertion order.
    async fn nearest(
        &self,
        query: &[f32],
        k: usize,
        partition: Option<&str>,
        metric: Metric,
    ) -> Result<Vec<(IndexEntry, f32)>> {
        let entries = self.entries(partition).await?;
        Ok(rank_nearest(entries, query, k, metric))
    }
}
