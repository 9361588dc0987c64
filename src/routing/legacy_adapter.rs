//! Bridge to the proven single-shot processing path.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::domain::{ClipOpsError, Result};
use crate::summarize::{SummarizationService, SummarizeSource, DEFAULT_TAG_COUNT};

#[async_trait::async_trait]
pub trait LegacyAdapter: Send + Sync {
    async fn process_request(
        &self,
        request_type: &str,
        request_data: &Value,
        user_id: i64,
        board_id: Option<i64>,
    ) -> Result<Value>;

    /// Liveness probe used by the router health check.
    async fn ping(&self) -> Result<()>;
}

/// Default adapter: serves clipper-style requests through the
/// summarization pipeline.
pub struct SummarizationLegacyAdapter {
    summarization: Arc<SummarizationService>,
}

impl SummarizationLegacyAdapter {
    pub fn new(summarization: Arc<SummarizationService>) -> Self {
        Self { summarization }
    }

    fn text_field<'a>(request_data: &'a Value, keys: &[&str]) -> Result<&'a str> {
        for key in keys {
            if let Some(text) = request_data.get(*key).and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    return Ok(text);
                }
            }
        }
        Err(ClipOpsError::validation(format!(
            "legacy request needs one of {keys:?}"
        )))
    }
}

#[async_trait::async_trait]
impl LegacyAdapter for SummarizationLegacyAdapter {
    async fn process_request(
        &self,
        request_type: &str,
        request_data: &Value,
        user_id: i64,
        _board_id: Option<i64>,
    ) -> Result<Value> {
        info!(request_type, user_id, "Processing with legacy system");

        match request_type {
            "clipper" | "summary" | "board_analysis" | "content_analysis" => {
                let content = Self::text_field(request_data, &["content", "html", "text"])?;
                let url = request_data
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or("legacy://inline-content");
                let tag_count = request_data
                    .get("tag_count")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_TAG_COUNT);

                let outcome = self
                    .summarization
                    .summarize(
                        SummarizeSource::Webpage { url, html: content },
                        user_id,
                        tag_count,
                        false,
                    )
                    .await?;

                Ok(json!({
                    "success": true,
                    "summary": outcome.summary,
                    "tags": outcome.tags,
                    "category": outcome.category,
                    "candidate_tags": outcome.candidate_tags,
                    "cached": outcome.cached,
                    "wtu_consumed": outcome.wtu_cost,
                }))
            }
            other => Err(ClipOpsError::validation(format!(
                "legacy path does not handle request type '{other}'"
            ))),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
