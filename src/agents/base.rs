//! Agent contract and the WTU-tracked execution harness.
//!
//! Agents implement four methods; the harness owns the cross-cutting
//! flow: input validation, model selection from user preferences,
//! traced execution, WTU accounting, and response assembly. A failing
//! agent becomes `success = false`, never a propagated error.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument};

use super::context::AgentContext;
use crate::accounting::WtuAccountant;
use crate::catalog::ModelCatalogService;
use crate::domain::{current_plan_month, LlmTier, ModelEntry, Result, UserModelPreferences};
use crate::domain::{CostSensitivity, QualityPreference};

/// What an agent's task execution hands back to the harness.
#[derive(Debug, Clone)]
pub struct AgentTaskOutput {
    /// String or object; object outputs merge into the next chain input.
    pub content: Value,
    pub metadata: serde_json::Map<String, Value>,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl AgentTaskOutput {
    pub fn text(content: impl Into<String>, input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            content: Value::String(content.into()),
            metadata: serde_json::Map::new(),
            input_tokens,
            output_tokens,
        }
    }

    pub fn object(content: Value, input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            content,
            metadata: serde_json::Map::new(),
            input_tokens,
            output_tokens,
        }
    }
}

#[async_trait::async_trait]
pub trait AiAgent: Send + Sync {
    /// Stable registry key (e.g. "content_analysis"). Distinct from the
    /// human-readable name.
    fn agent_type(&self) -> &str;

    /// Human-readable name for logs and response metadata.
    fn agent_name(&self) -> &str;

    /// Compiled-in default model alias, used only when preference-based
    /// selection finds nothing.
    fn default_model(&self) -> &str;

    fn capabilities(&self) -> Vec<&'static str>;

    async fn validate_input(&self, input: &Value, context: &AgentContext) -> bool;

    async fn execute_ai_task(
        &self,
        input: &Value,
        model_alias: &str,
        context: &AgentContext,
    ) -> Result<AgentTaskOutput>;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokensUsed {
    pub input: i64,
    pub output: i64,
    pub total: i64,
}

/// Result of one harnessed agent execution.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub content: Value,
    pub metadata: serde_json::Map<String, Value>,
    pub model_used: String,
    pub tokens_used: TokensUsed,
    pub wtu_consumed: i64,
    pub cost_usd: f64,
    pub execution_time_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl AgentResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            content: Value::String(message.clone()),
            metadata: serde_json::Map::new(),
            model_used: String::new(),
            tokens_used: TokensUsed::default(),
            wtu_consumed: 0,
            cost_usd: 0.0,
            execution_time_ms: 0,
            success: false,
            error_message: Some(message),
        }
    }
}

/// Executes agents with WTU tracking and preference-driven model choice.
pub struct AgentHarness {
    catalog: Arc<ModelCatalogService>,
    accountant: Arc<WtuAccountant>,
}

impl AgentHarness {
    pub fn new(catalog: Arc<ModelCatalogService>, accountant: Arc<WtuAccountant>) -> Self {
        Self {
            catalog,
            accountant,
        }
    }

    /// Preference-driven model selection.
    ///
    /// Order of precedence: the user's default model when active, then
    /// provider/avoid filters over the active catalog, a complexity and
    /// quality bias toward the premium or light tier, cheapest-first for
    /// cost-sensitive users, and finally the agent's compiled-in default.
    pub async fn select_optimal_model(
        &self,
        preferences: &UserModelPreferences,
        complexity: u8,
        fallback_alias: &str,
    ) -> String {
        match self
            .try_select_model(preferences, complexity, fallback_alias)
            .await
        {
            Ok(alias) => alias,
            Err(e) => {
                warn!(error = %e, "Model selection failed, using default model");
                fallback_alias.to_string()
            }
        }
    }

    async fn try_select_model(
        &self,
        preferences: &UserModelPreferences,
        complexity: u8,
        fallback_alias: &str,
    ) -> Result<String> {
        if let Some(default_alias) = &preferences.default_llm_model {
            if let Some(entry) = self.catalog.get_model_by_alias(default_alias).await? {
                if entry.is_active {
                    return Ok(entry.alias);
                }
            }
        }

        let mut available: Vec<ModelEntry> = self
            .catalog
            .get_active_models()
            .await?
            .into_iter()
            .filter(|m| m.tier != LlmTier::Embedding)
            .collect();

        if available.is_empty() {
            warn!("No active completion models in catalog, using default");
            return Ok(fallback_alias.to_string());
        }

        let preferred: Vec<ModelEntry> = available
            .iter()
            .filter(|m| preferences.prefers_provider(m.provider.as_str()))
            .cloned()
            .collect();
        if !preferred.is_empty() {
            available = preferred;
        }

        available.retain(|m| !preferences.avoids(&m.alias));
        if available.is_empty() {
            return Ok(fallback_alias.to_string());
        }

        if complexity >= 4 || preferences.quality_preference == QualityPreference::Quality {
            if let Some(model) = available.iter().find(|m| m.tier == LlmTier::Premium) {
                return Ok(model.alias.clone());
            }
        }

        if complexity <= 2 || preferences.quality_preference == QualityPreference::Speed {
            if let Some(model) = available.iter().find(|m| m.tier == LlmTier::Light) {
                return Ok(model.alias.clone());
            }
        }

        if preferences.cost_sensitivity == CostSensitivity::High {
            if let Some(model) = available.iter().min_by_key(|m| m.multiplier_weight()) {
                return Ok(model.alias.clone());
            }
        }

        Ok(fallback_alias.to_string())
    }

    async fn cost_usd(&self, alias: &str, input_tokens: i64, output_tokens: i64) -> f64 {
        let Ok(Some(entry)) = self.catalog.get_model_by_alias(alias).await else {
            return 0.0;
        };

        let million = Decimal::from(1_000_000);
        let input_cost = entry
            .price_input_per_million
            .map(|p| Decimal::from(input_tokens) / million * p)
            .unwrap_or(Decimal::ZERO);
        let output_cost = entry
            .price_output_per_million
            .map(|p| Decimal::from(output_tokens) / million * p)
            .unwrap_or(Decimal::ZERO);

        (input_cost + output_cost).to_f64().unwrap_or(0.0)
    }

    /// Run one agent with validation, tracing and WTU accounting.
    pub async fn process_with_wtu(
        &self,
        agent: &dyn AiAgent,
        input: &Value,
        context: &AgentContext,
    ) -> AgentResponse {
        let started = Instant::now();

        // Invalid input costs nothing: no LLM call, no WTU.
        if !agent.validate_input(input, context).await {
            warn!(agent = agent.agent_name(), "Agent input validation failed");
            return AgentResponse::failure("Invalid input data");
        }

        let selected_model = self
            .select_optimal_model(
                &context.user_preferences,
                context.complexity,
                agent.default_model(),
            )
            .await;

        info!(
            agent = agent.agent_name(),
            model = %selected_model,
            user_id = context.user_id,
            "Agent starting execution"
        );

        let span = info_span!(
            "agent_execution",
            agent_type = agent.agent_type(),
            model = %selected_model,
            user_id = context.user_id,
        );

        let outcome = agent
            .execute_ai_task(input, &selected_model, context)
            .instrument(span)
            .await;

        let execution_time_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(output) => {
                let (wtu_consumed, cost_usd) = self
                    .account_usage(context, &selected_model, &output)
                    .await;

                let mut metadata = output.metadata;
                metadata.insert(
                    "agent_name".to_string(),
                    Value::String(agent.agent_name().to_string()),
                );
                metadata.insert(
                    "agent_type".to_string(),
                    Value::String(agent.agent_type().to_string()),
                );

                info!(
                    agent = agent.agent_name(),
                    wtu = wtu_consumed,
                    execution_time_ms,
                    "Agent completed successfully"
                );

                AgentResponse {
                    content: output.content,
                    metadata,
                    model_used: selected_model,
                    tokens_used: TokensUsed {
                        input: output.input_tokens,
                        output: output.output_tokens,
                        total: output.input_tokens + output.output_tokens,
                    },
                    wtu_consumed,
                    cost_usd,
                    execution_time_ms,
                    success: true,
                    error_message: None,
                }
            }
            Err(e) => {
                error!(
                    agent = agent.agent_name(),
                    error = %e,
                    execution_time_ms,
                    "Agent execution failed"
                );

                let mut response = AgentResponse::failure(e.to_string());
                response.model_used = selected_model;
                response.execution_time_ms = execution_time_ms;
                response
            }
        }
    }

    /// Accounting failures degrade to zero-cost, they never fail the
    /// agent after its work already succeeded.
    async fn account_usage(
        &self,
        context: &AgentContext,
        model_alias: &str,
        output: &AgentTaskOutput,
    ) -> (i64, f64) {
        let wtu = match self
            .accountant
            .compute_wtu(output.input_tokens, output.output_tokens, model_alias)
            .await
        {
            Ok(wtu) => wtu,
            Err(e) => {
                error!(error = %e, "WTU computation failed");
                return (0, 0.0);
            }
        };

        if let Err(e) = self
            .accountant
            .record_usage(
                context.user_id,
                current_plan_month(),
                wtu,
                model_alias,
                context.board_id,
            )
            .await
        {
            error!(error = %e, "WTU recording failed");
            return (0, 0.0);
        }

        metrics::counter!("clipops_agent_wtu_total", wtu as u64);
        let cost = self
            .cost_usd(model_alias, output.input_tokens, output.output_tokens)
            .await;
        (wtu, cost)
    }
}
