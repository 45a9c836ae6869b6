//! The vector store facade: ingestion, retrieval, listing, and export.
//!
//! [`VectorStore`] owns the embedding index, the embedder, and the
//! sources registry. Its public operations never return provider or index
//! errors directly: failures are logged and turned into an empty result,
//! `None`, or [`IngestOutcome::Failed`].

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use tutor_rag_core::embedding::Embedder;
use tutor_rag_core::models::{IndexEntry, ScoredSegment, Segment};
use tutor_rag_core::search::{self, RetrievalParams};
use tutor_rag_core::store::IndexStore;

use crate::config::Config;
use crate::export::write_export;
use crate::sources::SourceRegistry;
use crate::sqlite_store::SqliteIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyIngested,
    NoContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyIngested => f.write_str("already ingested"),
            SkipReason::NoContent => f.write_str("no content"),
        }
    }
}

#[derive(Debug)]
pub enum IngestOutcome {
    Ingested { source: String, segments: usize },
    Skipped(SkipReason),
    Failed(anyhow::Error),
}

impl IngestOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, IngestOutcome::Failed(_))
    }
}

pub struct VectorStore {
    index: Box<dyn IndexStore>,
    embedder: Box<dyn Embedder>,
    sources: SourceRegistry,
    params: RetrievalParams,
    batch_size: usize,
    export_root: PathBuf,
}

impl VectorStore {
    /// Open the persistent store described by `config`. The index file is
    /// not created until the first ingestion.
    pub fn open(config: &Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        Ok(Self {
            index: Box::new(SqliteIndex::new(config.store.index_path())),
            embedder,
            sources: SourceRegistry::load(&config.store.sources_path()),
            params: config.retrieval.params()?,
            batch_size: config.embedding.batch_size,
            export_root: config.store.export_dir.clone(),
        })
    }

    /// Assemble a store from explicit parts.
    pub fn with_parts(
        index: Box<dyn IndexStore>,
        embedder: Box<dyn Embedder>,
        sources: SourceRegistry,
        params: RetrievalParams,
        batch_size: usize,
        export_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            index,
            embedder,
            sources,
            params,
            batch_size: batch_size.max(1),
            export_root: export_root.into(),
        }
    }

    pub fn index(&self) -> &dyn IndexStore {
        self.index.as_ref()
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn export_root(&self) -> &Path {
        &self.export_root
    }

    pub fn set_similarity_threshold(&mut self, threshold: f32) {
        self.params.similarity_threshold = threshold;
    }

    pub fn loaded_sources(&self) -> &[String] {
        self.sources.as_slice()
    }

    pub fn is_loaded(&self, source: &str) -> bool {
        self.sources.contains(source)
    }

    /// Embed and store `segments` for `source`, tagged with `partition`.
    ///
    /// All-or-nothing: the index is only written after every segment has
    /// been embedded, and the source is only recorded after the write.
    pub async fn ingest(
        &mut self,
        segments: Vec<String>,
        source: &str,
        partition: &str,
    ) -> IngestOutcome {
        if self.sources.contains(source) {
            tracing::info!(source, "document already ingested, skipping");
            return IngestOutcome::Skipped(SkipReason::AlreadyIngested);
        }
        if segments.is_empty() {
            tracing::warn!(source, "document produced no segments, skipping");
            return IngestOutcome::Skipped(SkipReason::NoContent);
        }

        let count = segments.len();
        if let Err(e) = self.embed_and_append(segments, source, partition).await {
            tracing::error!(source, partition, "ingestion failed: {:#}", e);
            return IngestOutcome::Failed(e);
        }

        if let Err(e) = self.sources.record(source) {
            tracing::warn!(source, "failed to persist source registry: {:#}", e);
        }
        tracing::info!(source, partition, segments = count, "ingested document");
        IngestOutcome::Ingested {
            source: source.to_string(),
            segments: count,
        }
    }

    async fn embed_and_append(
        &self,
        segments: Vec<String>,
        source: &str,
        partition: &str,
    ) -> Result<()> {
        let mut vectors = Vec::with_capacity(segments.len());
        for batch in segments.chunks(self.batch_size) {
            let embedded = self.embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} segments",
                    embedded.len(),
                    batch.len()
                );
            }
            vectors.extend(embedded);
        }

        let expected = match self.index.dimension().await? {
            Some(dim) => dim,
            None => vectors.first().map_or(0, Vec::len),
        };
        if let Some(v) = vectors.iter().find(|v| v.len() != expected) {
            anyhow::bail!(
                "embedding model '{}' produced {}-dimensional vectors but the index holds {}-dimensional vectors",
                self.embedder.model_name(),
                v.len(),
                expected
            );
        }

        let entries: Vec<IndexEntry> = segments
            .into_iter()
            .zip(vectors)
            .map(|(content, vector)| IndexEntry::new(Segment::new(content, source, partition), vector))
            .collect();

        self.index.append(&entries).await
    }

    /// Retrieve segments relevant to `query`, optionally within one
    /// partition. `k` defaults to `retrieval.top_k`.
    pub async fn search(
        &self,
        query: &str,
        partition: Option<&str>,
        k: Option<usize>,
    ) -> Vec<ScoredSegment> {
        if query.trim().is_empty() {
            tracing::warn!("empty query");
            return Vec::new();
        }
        match self.try_search(query, partition, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(partition = ?partition, "search failed: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        partition: Option<&str>,
        k: Option<usize>,
    ) -> Result<Vec<ScoredSegment>> {
        if self.index.count(None).await? == 0 {
            tracing::warn!("knowledge base is empty or not initialized");
            return Ok(Vec::new());
        }

        let k = k.unwrap_or(self.params.top_k).max(1);
        let query_vec = self.embedder.embed(query).await?;
        if let Some(dim) = self.index.dimension().await? {
            if dim != query_vec.len() {
                tracing::error!(
                    model = self.embedder.model_name(),
                    query_dim = query_vec.len(),
                    index_dim = dim,
                    "query embedding does not match the index dimension; was the index built with another model?"
                );
                return Ok(Vec::new());
            }
        }
        let hits =
            search::retrieve(self.index.as_ref(), &query_vec, partition, k, &self.params).await?;
        tracing::debug!(hits = hits.len(), k, "retrieved segments");
        Ok(hits)
    }

    /// Every stored entry in insertion order.
    pub async fn list_all(&self, partition: Option<&str>) -> Vec<IndexEntry> {
        match self.index.entries(partition).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("failed to list segments: {:#}", e);
                Vec::new()
            }
        }
    }

    pub async fn count(&self, partition: Option<&str>) -> usize {
        match self.index.count(partition).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("failed to count segments: {:#}", e);
                0
            }
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.count(None).await == 0
    }

    /// Export every entry grouped by source under the export root.
    /// `None` when there is nothing to export or the export failed.
    pub async fn export_by_source(&self) -> Option<PathBuf> {
        let entries = self.list_all(None).await;
        if entries.is_empty() {
            tracing::warn!("knowledge base is empty, nothing to export");
            return None;
        }
        match write_export(&entries, &self.export_root) {
            Ok(groups) => {
                tracing::info!(groups = groups.len(), root = %self.export_root.display(), "export complete");
                Some(self.export_root.clone())
            }
            Err(e) => {
                tracing::error!("export failed: {:#}", e);
                None
            }
        }
    }
}
