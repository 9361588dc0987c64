//! LLM gateway: the only place that speaks to provider APIs.
//!
//! No retry and no fallback live here; the tiered caller owns those.
//! Every failure is rewrapped into `ClipOpsError::Provider` so the
//! caller can distinguish provider trouble from its own bugs.

pub mod http;

use std::pin::Pin;

use futures::Stream;

use crate::domain::{LlmMessage, LlmResult, ModelEntry, Result};

pub use http::{HttpLlmGateway, ProviderEndpoint};

/// Text chunks produced by a streaming completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling and length controls for a completion call.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: Option<i64>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl CompletionOptions {
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    /// Single-shot completion.
    async fn complete(
        &self,
        model: &ModelEntry,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<LlmResult>;

    /// Streaming completion. The outer error covers call initiation;
    /// errors inside the stream cover mid-flight failures.
    async fn stream_complete(
        &self,
        model: &ModelEntry,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream>;

    /// Embedding generation.
    async fn embed(&self, model: &ModelEntry, text: &str) -> Result<Vec<f32>>;
}
