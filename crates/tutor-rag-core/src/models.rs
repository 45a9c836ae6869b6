//! Core data models shared by ingestion, retrieval, and chat.
//!
//! A [`Segment`] is one chunk of a source document together with the
//! source it came from and the partition ("teacher") it belongs to. The
//! index stores each segment as an [`IndexEntry`] next to its embedding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Where a segment came from and which partition it is tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub source: String,
    pub partition: String,
}

/// A chunk of source text, the unit of embedding and retrieval.
///
/// Segments are immutable once built. For deduplication their identity is
/// the exact `content` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub content: String,
    pub metadata: SegmentMetadata,
}

impl Segment {
    pub fn new(content: impl Into<String>, source: &str, partition: &str) -> Self {
        Self {
            content: content.into(),
            metadata: SegmentMetadata {
                source: source.to_string(),
                partition: partition.to_string(),
            },
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    pub fn partition(&self) -> &str {
        &self.metadata.partition
    }
}

/// A stored segment plus its embedding vector.
///
/// Entries are written once at ingestion time and never updated.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    /// Entry UUID.
    pub id: String,
    pub segment: Segment,
    /// Embedding of `segment.content`. Not serialized in listings.
    #[serde(skip_serializing)]
    pub vector: Vec<f32>,
    /// SHA-256 hex digest of the content.
    pub content_hash: String,
    /// Unix timestamp (seconds) of ingestion.
    pub created_at: i64,
}

impl IndexEntry {
    pub fn new(segment: Segment, vector: Vec<f32>) -> Self {
        let content_hash = content_hash(&segment.content);
        Self {
            id: Uuid::new_v4().to_string(),
            segment,
            vector,
            content_hash,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A retrieval hit: the segment and its distance to the query
/// (lower is more similar).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// SHA-256 hex digest of a segment's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_hash_matches_content() {
        let entry = IndexEntry::new(Segment::new("hello", "a.txt", "T1"), vec![1.0]);
        assert_eq!(entry.content_hash, content_hash("hello"));
        assert_eq!(entry.segment.partition(), "T1");
        assert_eq!(entry.segment.source(), "a.txt");
    }

    #[test]
    fn test_entry_ids_unique() {
        let a = IndexEntry::new(Segment::new("x", "a", "p"), vec![]);
        let b = IndexEntry::new(Segment::new("x", "a", "p"), vec![]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
