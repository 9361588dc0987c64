//! Specialized agents behind the coordinator registry.
//!
//! Agents receive the harness-selected model alias and resolve it
//! through the catalog, so they never hardcode a provider or model.

use std::sync::Arc;

use serde_json::{json, Value};

use super::base::{AgentTaskOutput, AiAgent};
use super::context::AgentContext;
use crate::catalog::ModelCatalogService;
use crate::domain::{ClipOpsError, LlmMessage, LlmResult, Result};
use crate::gateway::{CompletionOptions, LlmGateway};

const FALLBACK_MODEL_ALIAS: &str = "gpt-4o-mini";

/// Text an agent will analyze: explicit content, or whatever the chain
/// produced so far.
fn input_text(input: &Value) -> Option<String> {
    for key in ["content", "text", "html", "previous_output", "analysis", "summary"] {
        if let Some(Value::String(s)) = input.get(key) {
            if !s.trim().is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}

async fn call_selected_model(
    catalog: &ModelCatalogService,
    gateway: &dyn LlmGateway,
    model_alias: &str,
    prompt: String,
    options: &CompletionOptions,
) -> Result<LlmResult> {
    let entry = catalog
        .get_model_by_alias(model_alias)
        .await?
        .ok_or_else(|| {
            ClipOpsError::internal(format!("selected model '{model_alias}' is not in the catalog"))
        })?;

    gateway
        .complete(&entry, &[LlmMessage::user(prompt)], options)
        .await
}

/// Extracts the key points and structure of clipped content.
pub struct ContentAnalysisAgent {
    catalog: Arc<ModelCatalogService>,
    gateway: Arc<dyn LlmGateway>,
}

impl ContentAnalysisAgent {
    pub fn new(catalog: Arc<ModelCatalogService>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self { catalog, gateway }
    }
}

#[async_trait::async_trait]
impl AiAgent for ContentAnalysisAgent {
    fn agent_type(&self) -> &str {
        "content_analysis"
    }

    fn agent_name(&self) -> &str {
        "Content Analysis Agent"
    }

    fn default_model(&self) -> &str {
        FALLBACK_MODEL_ALIAS
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["key_point_extraction", "structure_analysis", "topic_detection"]
    }

    async fn validate_input(&self, input: &Value, _context: &AgentContext) -> bool {
        input_text(input).is_some()
    }

    async fn execute_ai_task(
        &self,
        input: &Value,
        model_alias: &str,
        _context: &AgentContext,
    ) -> Result<AgentTaskOutput> {
        let text = input_text(input)
            .ok_or_else(|| ClipOpsError::AgentValidationFailed("no content to analyze".into()))?;

        let prompt = format!(
            "Analyze the following content. List the main topics, the key \
             claims, and the overall structure in concise bullet points.\n\n{text}"
        );

        let result = call_selected_model(
            &self.catalog,
            self.gateway.as_ref(),
            model_alias,
            prompt,
            &CompletionOptions::new(0.3).with_max_tokens(600),
        )
        .await?;

        Ok(AgentTaskOutput::object(
            json!({ "analysis": result.content.trim() }),
            result.input_tokens,
            result.output_tokens,
        ))
    }
}

/// Produces a user-facing summary from raw content or a prior analysis.
pub struct SummaryGenerationAgent {
    catalog: Arc<ModelCatalogService>,
    gateway: Arc<dyn LlmGateway>,
}

impl SummaryGenerationAgent {
    pub fn new(catalog: Arc<ModelCatalogService>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self { catalog, gateway }
    }
}

#[async_trait::async_trait]
impl AiAgent for SummaryGenerationAgent {
    fn agent_type(&self) -> &str {
        "summary_generation"
    }

    fn agent_name(&self) -> &str {
        "Summary Generation Agent"
    }

    fn default_model(&self) -> &str {
        FALLBACK_MODEL_ALIAS
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["summarization", "compression", "highlight_extraction"]
    }

    async fn validate_input(&self, input: &Value, _context: &AgentContext) -> bool {
        input_text(input).is_some()
    }

    async fn execute_ai_task(
        &self,
        input: &Value,
        model_alias: &str,
        _context: &AgentContext,
    ) -> Result<AgentTaskOutput> {
        let text = input_text(input)
            .ok_or_else(|| ClipOpsError::AgentValidationFailed("no content to summarize".into()))?;

        let prompt = format!(
            "Write a clear 3-5 sentence summary of the following material. \
             Prefer concrete facts over generalities.\n\n{text}"
        );

        let result = call_selected_model(
            &self.catalog,
            self.gateway.as_ref(),
            model_alias,
            prompt,
            &CompletionOptions::new(0.3).with_max_tokens(400),
        )
        .await?;

        Ok(AgentTaskOutput::object(
            json!({ "summary": result.content.trim() }),
            result.input_tokens,
            result.output_tokens,
        ))
    }
}

/// Reviews the chain's output for factual and structural problems.
pub struct ValidatorAgent {
    catalog: Arc<ModelCatalogService>,
    gateway: Arc<dyn LlmGateway>,
}

impl ValidatorAgent {
    pub fn new(catalog: Arc<ModelCatalogService>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self { catalog, gateway }
    }
}

#[async_trait::async_trait]
impl AiAgent for ValidatorAgent {
    fn agent_type(&self) -> &str {
        "validator"
    }

    fn agent_name(&self) -> &str {
        "Validator Agent"
    }

    fn default_model(&self) -> &str {
        FALLBACK_MODEL_ALIAS
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["quality_review", "consistency_check"]
    }

    async fn validate_input(&self, input: &Value, _context: &AgentContext) -> bool {
        input_text(input).is_some()
    }

    async fn execute_ai_task(
        &self,
        input: &Value,
        model_alias: &str,
        _context: &AgentContext,
    ) -> Result<AgentTaskOutput> {
        let text = input_text(input)
            .ok_or_else(|| ClipOpsError::AgentValidationFailed("nothing to validate".into()))?;

        let prompt = format!(
            "Review the following output for internal consistency and \
             completeness. Reply with a short verdict followed by any \
             problems found, one per line.\n\n{text}"
        );

        let result = call_selected_model(
            &self.catalog,
            self.gateway.as_ref(),
            model_alias,
            prompt,
            &CompletionOptions::new(0.2).with_max_tokens(300),
        )
        .await?;

        Ok(AgentTaskOutput::object(
            json!({ "validation_report": result.content.trim() }),
            result.input_tokens,
            result.output_tokens,
        ))
    }
}
