//! In-process test doubles.
//!
//! `ScriptedGateway` stands in for provider APIs: failures are injected
//! per model alias, completion contents can be queued in order, and
//! embeddings are deterministic so similarity math is reproducible.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::{ClipOpsError, LlmMessage, LlmResult, ModelEntry, Result};
use crate::gateway::{ChunkStream, CompletionOptions, LlmGateway};

/// Prompt sentinel that makes a scripted stream fail after its first chunk.
pub const MID_STREAM_FAILURE_PROMPT: &str = "##midstream-failure##";

pub const SCRIPTED_INPUT_TOKENS: i64 = 1200;
pub const SCRIPTED_OUTPUT_TOKENS: i64 = 300;

#[derive(Default)]
pub struct ScriptedGateway {
    failing_models: HashSet<String>,
    failing_embeddings: HashSet<String>,
    queued_responses: Mutex<VecDeque<String>>,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
    completions: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway where the given aliases always raise a provider error.
    pub fn failing_models(aliases: &[&str]) -> Self {
        Self {
            failing_models: aliases.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Queue completion contents returned in FIFO order; once drained,
    /// completions fall back to `"response from <alias>"`.
    pub fn with_queued(self, responses: &[&str]) -> Self {
        {
            let mut queue = self.queued_responses.lock().unwrap();
            queue.extend(responses.iter().map(|r| r.to_string()));
        }
        self
    }

    pub fn queue_response(&self, content: impl Into<String>) {
        self.queued_responses.lock().unwrap().push_back(content.into());
    }

    pub fn set_embedding(&self, text: &str, embedding: Vec<f32>) {
        self.embeddings.lock().unwrap().insert(text.to_string(), embedding);
    }

    pub fn fail_embedding_for(mut self, text: &str) -> Self {
        self.failing_embeddings.insert(text.to_string());
        self
    }

    /// Number of completions served so far.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn next_content(&self, alias: &str) -> String {
        self.queued_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("response from {alias}"))
    }

    /// Deterministic pseudo-embedding derived from text bytes; identical
    /// inputs map to identical vectors.
    fn derived_embedding(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 8] += byte as f32 / 255.0;
        }
        vector
    }
}

#[async_trait::async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(
        &self,
        model: &ModelEntry,
        _messages: &[LlmMessage],
        _options: &CompletionOptions,
    ) -> Result<LlmResult> {
        if self.failing_models.contains(&model.alias) {
            return Err(ClipOpsError::provider(
                model.alias.clone(),
                "scripted provider failure",
            ));
        }

        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResult {
            content: self.next_content(&model.alias),
            model_alias: model.alias.clone(),
            input_tokens: SCRIPTED_INPUT_TOKENS,
            output_tokens: SCRIPTED_OUTPUT_TOKENS,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn stream_complete(
        &self,
        model: &ModelEntry,
        messages: &[LlmMessage],
        _options: &CompletionOptions,
    ) -> Result<ChunkStream> {
        if self.failing_models.contains(&model.alias) {
            return Err(ClipOpsError::provider(
                model.alias.clone(),
                "scripted provider failure",
            ));
        }

        let alias = model.alias.clone();
        let mid_stream_failure = messages
            .iter()
            .any(|m| m.content == MID_STREAM_FAILURE_PROMPT);

        let items: Vec<Result<String>> = if mid_stream_failure {
            vec![
                Ok(format!("partial from {alias} ")),
                Err(ClipOpsError::provider(alias, "scripted mid-stream failure")),
            ]
        } else {
            vec![Ok(format!("response from {alias}"))]
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn embed(&self, model: &ModelEntry, text: &str) -> Result<Vec<f32>> {
        if self.failing_models.contains(&model.alias) || self.failing_embeddings.contains(text) {
            return Err(ClipOpsError::provider(
                model.alias.clone(),
                "scripted embedding failure",
            ));
        }

        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(vector) = self.embeddings.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::derived_embedding(text))
    }
}
