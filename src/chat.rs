//! Retrieval-augmented chat.
//!
//! A [`ChatSession`] keeps an append-only history. Each turn searches the
//! vector store in the active partition, builds a context-augmented prompt,
//! and asks the [`ChatProvider`] for a reply. Provider failures come back as
//! an inline `"Error: ..."` reply so the session keeps going.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use tutor_rag_core::chat::{ChatProvider, GenerationParams};
use tutor_rag_core::models::{ChatMessage, ScoredSegment};

use crate::config::Config;
use crate::error::ProviderError;
use crate::vector_store::VectorStore;

const SENTENCE_TERMINATORS: &[char] = &['。', '.', '!', '?', '！', '？'];

/// Build the chat provider selected by `chat.provider`.
pub fn create_chat_provider(config: &Config) -> Result<Box<dyn ChatProvider>> {
    match config.chat.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledChat)),
        "siliconflow" | "openai" => Ok(Box::new(HttpChatProvider::new(
            &config.chat.provider,
            &config.chat.api_base,
            config.api_key.clone(),
            config.chat.timeout_secs,
        )?)),
        other => anyhow::bail!("Unknown chat provider: {}", other),
    }
}

pub struct DisabledChat;

#[async_trait]
impl ChatProvider for DisabledChat {
    async fn complete(&self, _: &[ChatMessage], _: &GenerationParams) -> Result<String> {
        Err(ProviderError::Disabled("chat").into())
    }
}

/// Chat provider for an OpenAI-compatible `POST {api_base}/chat/completions`.
pub struct HttpChatProvider {
    provider: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new(
        provider: &str,
        api_base: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            provider: provider.to_string(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            client,
        })
    }
}

fn request_body(messages: &[ChatMessage], params: &GenerationParams) -> serde_json::Value {
    serde_json::json!({
        "model": params.model,
        "stream": false,
        "max_tokens": params.max_tokens,
        "temperature": params.temperature,
        "top_p": params.top_p,
        "top_k": params.top_k,
        "frequency_penalty": params.frequency_penalty,
        "n": 1,
        "stop": [],
        "messages": messages,
    })
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request_body(messages, params))
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
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;
        Ok(content.to_string())
    }
}

pub struct ChatSession {
    provider: Box<dyn ChatProvider>,
    params: GenerationParams,
    out_of_scope_reply: String,
    focus_sentences: bool,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(provider: Box<dyn ChatProvider>, config: &Config) -> Self {
        Self {
            provider,
            params: config.chat.generation_params(),
            out_of_scope_reply: config.chat.out_of_scope_reply.clone(),
            focus_sentences: config.chat.focus_sentences,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Run one conversational turn and return the reply text.
    pub async fn send(
        &mut self,
        store: &VectorStore,
        partition: Option<&str>,
        message: &str,
    ) -> String {
        if message.trim().is_empty() {
            return "Error: message must not be empty".to_string();
        }

        let hits = store.search(message, partition, None).await;
        let context = build_context(&hits, message, self.focus_sentences);
        let store_empty = context.is_none() && store.is_empty().await;

        let final_turn = match &context {
            Some(context) => format!(
                "Reference information:\n{}\n\nAnswer based on the information above: {}",
                context, message
            ),
            None if !store_empty => {
                tracing::info!(partition = ?partition, "no relevant context found");
                let reply = self.out_of_scope_reply.clone();
                self.history.push(ChatMessage::user(message));
                self.history.push(ChatMessage::assistant(reply.clone()));
                return reply;
            }
            None => {
                tracing::warn!("knowledge base is empty, answering without context");
                message.to_string()
            }
        };

        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(final_turn));

        match self.provider.complete(&messages, &self.params).await {
            Ok(reply) => {
                self.history.push(ChatMessage::user(message));
                self.history.push(ChatMessage::assistant(reply.clone()));
                reply
            }
            Err(e) => {
                tracing::error!("chat completion failed: {:#}", e);
                format!("Error: {:#}", e)
            }
        }
    }
}

/// Join retrieved segments into a context block. With `focus` only the
/// sentences mentioning a query term are kept. `None` when nothing is left.
pub fn build_context(hits: &[ScoredSegment], query: &str, focus: bool) -> Option<String> {
    let parts: Vec<String> = hits
        .iter()
        .filter_map(|hit| {
            let content = hit.segment.content.trim();
            let part = if focus {
                focus_sentences(content, query)
            } else {
                content.to_string()
            };
            (!part.is_empty()).then_some(part)
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Keep the sentences of `text` that contain any whitespace-separated
/// term of `query`.
pub fn focus_sentences(text: &str, query: &str) -> String {
    let terms: Vec<&str> = query.split_whitespace().collect();
    text.split_inclusive(SENTENCE_TERMINATORS)
        .filter(|sentence| terms.iter().any(|term| sentence.contains(term)))
        .collect::<String>()
        .trim()
        .to_string()
}
