//! OpenAI-compatible HTTP gateway.
//!
//! All configured providers are driven through the chat-completions and
//! embeddings wire shapes; per-provider base URLs point at the native or
//! compatibility endpoint. A provider with no credentials is simply not
//! registered, which makes its models fail fast during tier iteration.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info_span, Instrument};

use super::{ChunkStream, CompletionOptions, LlmGateway};
use crate::domain::{ClipOpsError, LlmMessage, LlmResult, ModelEntry, Provider, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Credentials and endpoint for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub api_key: String,
    pub base_url: String,
}

impl ProviderEndpoint {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

/// Default endpoint for a provider when the config gives only a key.
pub fn default_base_url(provider: &Provider) -> &'static str {
    match provider {
        Provider::OpenAI => "https://api.openai.com/v1",
        Provider::Anthropic => "https://api.anthropic.com/v1",
        Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        Provider::Perplexity => "https://api.perplexity.ai",
        Provider::Other(_) => "http://localhost:8000/v1",
    }
}

pub struct HttpLlmGateway {
    client: reqwest::Client,
    endpoints: HashMap<Provider, ProviderEndpoint>,
}

impl HttpLlmGateway {
    pub fn new(endpoints: HashMap<Provider, ProviderEndpoint>) -> Result<Self> {
        Self::with_timeout(endpoints, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        endpoints: HashMap<Provider, ProviderEndpoint>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClipOpsError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoints })
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        self.endpoints.keys().cloned().collect()
    }

    fn endpoint_for(&self, model: &ModelEntry) -> Result<&ProviderEndpoint> {
        self.endpoints.get(&model.provider).ok_or_else(|| {
            ClipOpsError::provider(
                model.alias.clone(),
                format!("provider '{}' has no configured credentials", model.provider),
            )
        })
    }

    fn completion_body(
        model: &ModelEntry,
        messages: &[LlmMessage],
        options: &CompletionOptions,
        stream: bool,
    ) -> serde_json::Value {
        let messages: Vec<_> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model.model_name,
            "messages": messages,
            "temperature": options.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    async fn post_json(
        &self,
        endpoint: &ProviderEndpoint,
        path: &str,
        body: &serde_json::Value,
        model: &ModelEntry,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{}", endpoint.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ClipOpsError::provider(model.alias.clone(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(model = %model.alias, %status, "Provider returned error status");
            return Err(ClipOpsError::provider(
                model.alias.clone(),
                format!("HTTP {status}: {detail}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn complete(
        &self,
        model: &ModelEntry,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<LlmResult> {
        let span = info_span!(
            "llm_call",
            provider = %model.provider,
            model = %model.model_name,
            operation = "complete",
        );

        async {
            let endpoint = self.endpoint_for(model)?;
            let body = Self::completion_body(model, messages, options, false);
            let response = self
                .post_json(endpoint, "chat/completions", &body, model)
                .await?;

            let parsed: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| ClipOpsError::provider(model.alias.clone(), e.to_string()))?;

            let choice = parsed.choices.into_iter().next().ok_or_else(|| {
                ClipOpsError::provider(model.alias.clone(), "response carried no choices")
            })?;
            let usage = parsed.usage.unwrap_or_default();

            debug!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "Completion finished"
            );

            Ok(LlmResult {
                content: choice.message.content.unwrap_or_default(),
                model_alias: model.alias.clone(),
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                finish_reason: choice.finish_reason,
            })
        }
        .instrument(span)
        .await
    }

    async fn stream_complete(
        &self,
        model: &ModelEntry,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream> {
        let span = info_span!(
            "llm_call",
            provider = %model.provider,
            model = %model.model_name,
            operation = "stream",
        );

        let endpoint = self.endpoint_for(model)?;
        let body = Self::completion_body(model, messages, options, true);
        let response = self
            .post_json(endpoint, "chat/completions", &body, model)
            .instrument(span)
            .await?;

        let alias = model.alias.clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ClipOpsError::provider(alias.clone(), e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited; keep the trailing
                // partial line in the buffer for the next read.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == "[DONE]" {
                        return;
                    }

                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(frame) => {
                            let content = frame
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                                .unwrap_or_default();
                            if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(Err(ClipOpsError::provider(
                                    alias.clone(),
                                    format!("malformed stream frame: {e}"),
                                )))
                                .await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn embed(&self, model: &ModelEntry, text: &str) -> Result<Vec<f32>> {
        let span = info_span!(
            "llm_call",
            provider = %model.provider,
            model = %model.model_name,
            operation = "embed",
        );

        async {
            let endpoint = self.endpoint_for(model)?;
            let body = json!({ "model": model.model_name, "input": [text] });
            let response = self.post_json(endpoint, "embeddings", &body, model).await?;

            let parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| ClipOpsError::provider(model.alias.clone(), e.to_string()))?;

            parsed
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or_else(|| {
                    ClipOpsError::provider(model.alias.clone(), "embedding response was empty")
                })
        }
        .instrument(span)
        .await
    }
}

// ===== Wire types =====

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
