//! SQLite-backed [`IndexStore`].
//!
//! The database file is created on the first append. Reads against a file
//! that does not exist yet return empty results without creating it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use tutor_rag_core::embedding::{blob_to_vec, vec_to_blob};
use tutor_rag_core::models::{IndexEntry, Segment};
use tutor_rag_core::store::IndexStore;

use crate::db;
use crate::migrate;

pub struct SqliteIndex {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = db::connect(&self.path)
                    .await
                    .with_context(|| format!("Failed to open index: {}", self.path.display()))?;
                migrate::run_migrations(&pool).await?;
                Ok::<_, anyhow::Error>(pool)
            })
            .await
    }

    /// The pool, or `None` while the index has never been written.
    async fn existing_pool(&self) -> Result<Option<&SqlitePool>> {
        if self.pool.get().is_none() && !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(self.pool().await?))
    }
}

#[async_trait]
impl IndexStore for SqliteIndex {
    async fn append(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO segments (id, content, source, partition_tag, content_hash, created_at, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.segment.content)
            .bind(entry.segment.source())
            .bind(entry.segment.partition())
            .bind(&entry.content_hash)
            .bind(entry.created_at)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn entries(&self, partition: Option<&str>) -> Result<Vec<IndexEntry>> {
        let Some(pool) = self.existing_pool().await? else {
            return Ok(Vec::new());
        };

        let rows = match partition {
            Some(p) => {
                sqlx::query(
                    "SELECT id, content, source, partition_tag, content_hash, created_at, embedding \
                     FROM segments WHERE partition_tag = ? ORDER BY seq",
                )
                .bind(p)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, content, source, partition_tag, content_hash, created_at, embedding \
                     FROM segments ORDER BY seq",
                )
                .fetch_all(pool)
                .await?
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.try_get("content")?;
            let source: String = row.try_get("source")?;
            let partition: String = row.try_get("partition_tag")?;
            let blob: Vec<u8> = row.try_get("embedding")?;
            entries.push(IndexEntry {
                id: row.try_get("id")?,
                segment: Segment::new(content, &source, &partition),
                vector: blob_to_vec(&blob),
                content_hash: row.try_get("content_hash")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(entries)
    }

    async fn count(&self, partition: Option<&str>) -> Result<usize> {
        let Some(pool) = self.existing_pool().await? else {
            return Ok(0);
        };

        let count: i64 = match partition {
            Some(p) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM segments WHERE partition_tag = ?")
                    .bind(p)
                    .fetch_one(pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM segments")
                    .fetch_one(pool)
                    .await?
            }
        };
        Ok(count as usize)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        let Some(pool) = self.existing_pool().await? else {
            return Ok(None);
        };
        let bytes: Option<i64> =
            sqlx::query_scalar("SELECT length(embedding) FROM segments ORDER BY seq LIMIT 1")
                .fetch_optional(pool)
                .await?;
        Ok(bytes.map(|b| b as usize / std::mem::size_of::<f32>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_rag_core::embedding::Metric;
    use tempfile::TempDir;

    fn entry(content: &str, partition: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(Segment::new(content, "notes.txt", partition), vector)
    }

    #[tokio::test]
    async fn test_reads_before_first_write_do_not_create_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db").join("index.sqlite");
        let index = SqliteIndex::new(&path);

        assert_eq!(index.count(None).await.unwrap(), 0);
        assert!(index.entries(None).await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dimension_from_first_entry() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::new(tmp.path().join("index.sqlite"));
        assert_eq!(index.dimension().await.unwrap(), None);

        index
            .append(&[entry("a", "T1", vec![0.5, 0.25, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.dimension().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_append_roundtrips_vectors_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let index = SqliteIndex::new(&path);
        index
            .append(&[
                entry("first", "T1", vec![0.5, -1.25]),
                entry("second", "T2", vec![1.0, 0.0]),
                entry("third", "T1", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let reopened = SqliteIndex::new(&path);
        let all = reopened.entries(None).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|e| e.segment.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(all[0].vector, vec![0.5, -1.25]);
        assert_eq!(all[0].segment.source(), "notes.txt");

        assert_eq!(reopened.count(Some("T1")).await.unwrap(), 2);
        assert_eq!(reopened.count(Some("T3")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nearest_within_partition() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::new(tmp.path().join("index.sqlite"));
        index
            .append(&[
                entry("b-exact", "B", vec![1.0, 0.0]),
                entry("a-close", "A", vec![0.8, 0.2]),
                entry("a-far", "A", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index
            .nearest(&[1.0, 0.0], 5, Some("A"), Metric::L2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.segment.content, "a-close");
        assert!(hits.iter().all(|(e, _)| e.segment.partition() == "A"));
    }
}
