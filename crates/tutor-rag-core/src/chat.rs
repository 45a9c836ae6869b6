//! Chat-completion provider trait and generation parameters.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::ChatMessage;

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub frequency_penalty: f32,
}

/// A single-shot (non-streaming) chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the ordered conversation and return the assistant's reply.
    async fn complete(&self, messages: &[ChatMessage], params: &GenerationParams)
        -> Result<String>;
}
