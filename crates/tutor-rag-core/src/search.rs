//! Retrieval algorithm: nearest neighbours, threshold, and dedup.
//!
//! The algorithm runs entirely through the [`IndexStore`] trait. The
//! caller embeds the query and passes the vector plus [`RetrievalParams`].
//!
//! # Steps
//!
//! 1. Fetch the `k` nearest entries (optionally within one partition).
//! 2. Keep hits whose distance is strictly below `similarity_threshold`.
//! 3. Drop later hits whose content exactly equals an earlier hit.
//!
//! Ranking is a stable sort on distance, so equal distances keep the
//! index's insertion order.

use std::cmp::Ordering;
use std::collections::HashSet;

use anyhow::Result;

use crate::embedding::Metric;
use crate::models::{IndexEntry, ScoredSegment};
use crate::store::IndexStore;

/// Retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    /// Number of nearest entries fetched before filtering.
    pub top_k: usize,
    /// Maximum accepted distance (exclusive).
    pub similarity_threshold: f32,
    pub metric: Metric,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            metric: Metric::L2,
        }
    }
}

/// Rank `entries` by distance to `query` and keep the closest `k`.
pub fn rank_nearest(
    entries: Vec<IndexEntry>,
    query: &[f32],
    k: usize,
    metric: Metric,
) -> Vec<(IndexEntry, f32)> {
    let mut scored: Vec<(IndexEntry, f32)> = entries
        .into_iter()
        .map(|entry| {
            let distance = metric.distance(query, &entry.vector);
            (entry, distance)
        })
        .collect();

    // NaN sorts last
    scored.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (false, false) => a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    });
    scored.truncate(k);
    scored
}

/// Apply the distance threshold and exact-content dedup to ranked hits.
pub fn filter_hits(hits: Vec<(IndexEntry, f32)>, similarity_threshold: f32) -> Vec<ScoredSegment> {
    let mut seen: HashSet<String> = HashSet::new();
    hits.into_iter()
        .filter(|(_, score)| *score < similarity_threshold)
        .filter(|(entry, _)| seen.insert(entry.segment.content.clone()))
        .map(|(entry, score)| ScoredSegment {
            segment: entry.segment,
            score,
        })
        .collect()
}

/// Run retrieval for an already-embedded query.
pub async fn retrieve<S: IndexStore + ?Sized>(
    store: &S,
    query_vec: &[f32],
    partition: Option<&str>,
    k: usize,
    params: &RetrievalParams,
) -> Result<Vec<ScoredSegment>> {
    let hits = store.nearest(query_vec, k, partition, params.metric).await?;
    Ok(filter_hits(hits, params.similarity_threshold))
}
