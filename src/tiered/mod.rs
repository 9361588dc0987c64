//! Tier-based LLM calling with automatic fallback.
//!
//! Callers name a tier, never a model. The catalog defines the ordered
//! model list per tier; on a provider failure the next model is tried
//! and every attempt leaves a `model_call_logs` row. When the whole tier
//! is exhausted the caller sees `AllProvidersFailed`.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::catalog::ModelCatalogService;
use crate::domain::{ClipOpsError, LlmMessage, LlmResult, LlmTier, ModelCallLog, Result};
use crate::gateway::{ChunkStream, CompletionOptions, LlmGateway};
use crate::storage::CallLogRepository;

const STREAM_CHANNEL_CAPACITY: usize = 1;

pub struct TieredClient {
    catalog: Arc<ModelCatalogService>,
    gateway: Arc<dyn LlmGateway>,
    call_logs: Arc<dyn CallLogRepository>,
}

impl TieredClient {
    pub fn new(
        catalog: Arc<ModelCatalogService>,
        gateway: Arc<dyn LlmGateway>,
        call_logs: Arc<dyn CallLogRepository>,
    ) -> Self {
        Self {
            catalog,
            gateway,
            call_logs,
        }
    }

    /// Logging must never take the request down with it.
    async fn record_log(&self, log: ModelCallLog) {
        if let Err(e) = self.call_logs.record(&log).await {
            error!("Failed to record model call log: {e}");
        }
    }

    /// Single-shot call with tier fallback.
    pub async fn call(
        &self,
        tier: LlmTier,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<LlmResult> {
        let models = self.catalog.get_models_by_tier(tier).await?;
        let mut attempted = Vec::new();

        for (i, model) in models.iter().enumerate() {
            let started = Instant::now();
            info!(tier = %tier, alias = %model.alias, model = %model.model_name, "Attempting LLM call");

            match self.gateway.complete(model, messages, options).await {
                Ok(result) => {
                    let elapsed_ms = started.elapsed().as_millis() as i64;
                    self.record_log(ModelCallLog::success(
                        &model.alias,
                        tier.as_str(),
                        result.input_tokens,
                        result.output_tokens,
                        elapsed_ms,
                    ))
                    .await;

                    info!(alias = %model.alias, elapsed_ms, "LLM call succeeded");
                    metrics::increment_counter!("clipops_llm_calls_total");
                    return Ok(result);
                }
                Err(e) if e.is_provider_failure() => {
                    let elapsed_ms = started.elapsed().as_millis() as i64;
                    attempted.push(model.alias.clone());
                    let fallback_to = models.get(i + 1).map(|m| m.alias.clone());

                    self.record_log(ModelCallLog::failure(
                        &model.alias,
                        tier.as_str(),
                        "ProviderError",
                        e.to_string(),
                        fallback_to.clone(),
                        elapsed_ms,
                    ))
                    .await;

                    metrics::increment_counter!("clipops_llm_fallbacks_total");
                    warn!(
                        alias = %model.alias,
                        tier = %tier,
                        error = %e,
                        ?fallback_to,
                        "Model failed, trying next model"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClipOpsError::AllProvidersFailed {
            tier: tier.as_str().to_string(),
            attempted,
        })
    }

    /// Streaming call. Fallback applies only until the first chunk has
    /// been yielded to the consumer: once any text is out, a later error
    /// from the same model surfaces on the stream instead of silently
    /// splicing in a different model's continuation.
    pub async fn stream(
        &self,
        tier: LlmTier,
        messages: &[LlmMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream> {
        let models = self.catalog.get_models_by_tier(tier).await?;
        let gateway = self.gateway.clone();
        let messages = messages.to_vec();
        let options = options.clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut attempted = Vec::new();

            for model in &models {
                info!(tier = %tier, alias = %model.alias, "Attempting streaming call");

                let mut stream = match gateway.stream_complete(model, &messages, &options).await {
                    Ok(stream) => stream,
                    Err(e) if e.is_provider_failure() => {
                        attempted.push(model.alias.clone());
                        warn!(alias = %model.alias, error = %e, "Stream initiation failed, trying next model");
                        continue;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                // The first item decides whether this model owns the
                // stream. An error here still allows fallback.
                match stream.next().await {
                    None => {
                        info!(alias = %model.alias, "Streaming completed (empty)");
                        return;
                    }
                    Some(Err(e)) => {
                        attempted.push(model.alias.clone());
                        warn!(alias = %model.alias, error = %e, "Stream failed before first chunk, trying next model");
                        continue;
                    }
                    Some(Ok(first)) => {
                        info!(alias = %model.alias, "Streaming started");
                        if tx.send(Ok(first)).await.is_err() {
                            return;
                        }
                    }
                }

                // Committed to this model; forward chunks until the end
                // and surface mid-stream errors without fallback.
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            error!(alias = %model.alias, error = %e, "Streaming failed mid-stream, chunks already sent");
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                info!(alias = %model.alias, "Streaming completed");
                return;
            }

            let _ = tx
                .send(Err(ClipOpsError::AllProvidersFailed {
                    tier: tier.as_str().to_string(),
                    attempted,
                }))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Embedding generation; uses the first active model of the embedding
    /// tier. No fallback: different embedding models produce incompatible
    /// vector spaces.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let models = self.catalog.get_models_by_tier(LlmTier::Embedding).await?;
        let model = &models[0];

        info!(alias = %model.alias, "Creating embedding");
        self.gateway.embed(model, text).await
    }
}
