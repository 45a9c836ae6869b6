use anyhow::Result;
use sqlx::SqlitePool;

/// Create the `segments` table and its indexes if they do not exist.
///
/// `seq` preserves insertion order, which ranking relies on to break ties.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            source TEXT NOT NULL,
            partition_tag TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_partition ON segments(partition_tag)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_source ON segments(source)")
        .execute(pool)
        .await?;

    Ok(())
}
