//! Typed leaf errors for the HTTP providers.
//!
//! These surface through `anyhow::Result` at module boundaries; callers
//! that care can `downcast_ref::<ProviderError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("{0} provider is disabled")]
    Disabled(&'static str),

    #[error("no API key configured (set SILICONFLOW_API_KEY or RAG_API_KEY)")]
    MissingApiKey,
}
