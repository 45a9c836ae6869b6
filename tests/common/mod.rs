#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tutor_rag::config::{parse_config, Config};
use tutor_rag_core::chat::{ChatProvider, GenerationParams};
use tutor_rag_core::embedding::Embedder;
use tutor_rag_core::models::ChatMessage;
use tutor_rag::vector_store::VectorStore;

pub const DIMS: usize = 16;

/// Deterministic bag-of-characters embedder: each char bumps one of
/// [`DIMS`] buckets, then the vector is L2-normalized. Identical texts
/// embed identically; texts sharing no characters are orthogonal-ish.
pub struct FakeEmbedder;

pub fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        v[(c as u32 as usize) % DIMS] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| fake_vector(t)).collect())
    }
}

/// Stands in for a different embedding model: same buckets, padded to a
/// wider vector.
pub struct WideEmbedder;

#[async_trait]
impl Embedder for WideEmbedder {
    fn model_name(&self) -> &str {
        "wide"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = fake_vector(t);
                v.resize(DIMS + 8, 0.0);
                v
            })
            .collect())
    }
}

/// Embeds successfully until `fail_after` texts have been embedded.
pub struct FailingEmbedder {
    pub fail_after: usize,
    pub seen: Mutex<usize>,
}

impl FailingEmbedder {
    pub fn new(fail_after: usize) -> Self {
        Self {
            fail_after,
            seen: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut seen = self.seen.lock().unwrap();
        if *seen + texts.len() > self.fail_after {
            bail!("siliconflow API error 503: upstream unavailable");
        }
        *seen += texts.len();
        Ok(texts.iter().map(|t| fake_vector(t)).collect())
    }
}

/// Chat provider that records every request and answers with a fixed reply
/// (or fails when `reply` is `None`).
#[derive(Clone)]
pub struct FakeChat {
    pub reply: Option<String>,
    pub requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn complete(&self, messages: &[ChatMessage], _: &GenerationParams) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("chat API error 500: boom"),
        }
    }
}

/// A config rooted in `dir` with the disabled providers.
pub fn test_config(dir: &Path) -> Config {
    let text = format!(
        r#"
[store]
persist_dir = "{root}/db"
export_dir = "{root}/exported_segments"
report_dir = "{root}/splits"

[partitions]
path = "{root}/config/partitions.json"

[chunking]
chunk_size = 40
chunk_overlap = 5

[embedding]
provider = "disabled"
batch_size = 2

[chat]
provider = "disabled"
"#,
        root = dir.display()
    );
    parse_config(&text).unwrap()
}

/// A persistent store under `dir` using [`FakeEmbedder`].
pub fn open_store(dir: &Path) -> VectorStore {
    VectorStore::open(&test_config(dir), Box::new(FakeEmbedder)).unwrap()
}

/// A persistent store under `dir` using [`WideEmbedder`].
pub fn open_wide_store(dir: &Path) -> VectorStore {
    VectorStore::open(&test_config(dir), Box::new(WideEmbedder)).unwrap()
}
