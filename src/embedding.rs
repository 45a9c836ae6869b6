//! Embedding providers.
//!
//! - **[`HttpEmbedder`]**: calls an OpenAI-compatible `POST {api_base}/embeddings`
//!   endpoint (SiliconFlow by default).
//! - **[`DisabledEmbedder`]**: always fails; used when `embedding.provider = "disabled"`.
//!
//! Use [`create_embedder`] to build the one selected by the configuration.
//! Requests are not retried: a non-success status is reported with its body.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use tutor_rag_core::embedding::Embedder;

use crate::config::Config;
use crate::error::ProviderError;

/// Build the embedder selected by `embedding.provider`.
///
/// A missing API key is not an error here; it surfaces on the first call,
/// so offline commands work without one.
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.embedding.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "siliconflow" | "openai" => Ok(Box::new(HttpEmbedder::new(
            &config.embedding.provider,
            &config.embedding.api_base,
            config.embedding.model.name(),
            config.api_key.clone(),
            config.embedding.timeout_secs,
        )?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// An embedder that refuses every request.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ProviderError::Disabled("embedding").into())
    }
}

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    provider: String,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        provider: &str,
        api_base: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            provider: provider.to_string(),
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.provider.clone(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let json: serde_json::Value = response.json().await.map_err(ProviderError::from)?;
        let vectors = parse_embedding_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` when present.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("missing embedding".to_string()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
