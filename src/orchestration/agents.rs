//! Plan agents: the units the executor schedules.
//!
//! All of them go through the tiered caller, so they name a capability
//! tier and never a concrete model.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::models::{AgentResult, PlanAgentContext};
use crate::domain::{LlmMessage, LlmTier, Result};
use crate::gateway::CompletionOptions;
use crate::tiered::TieredClient;

#[async_trait::async_trait]
pub trait PlanAgent: Send + Sync {
    /// Registry name referenced by `AgentSpec.agent`.
    fn name(&self) -> &str;

    async fn run(&self, context: &PlanAgentContext) -> Result<AgentResult>;
}

/// Condenses the request's selected contents into a working summary.
pub struct SummarizerAgent {
    tiered: Arc<TieredClient>,
}

impl SummarizerAgent {
    pub fn new(tiered: Arc<TieredClient>) -> Self {
        Self { tiered }
    }

    fn build_messages(context: &PlanAgentContext) -> Vec<LlmMessage> {
        vec![
            LlmMessage::system(
                "You condense source material into a faithful, compact summary \
                 that a writer can build on.",
            ),
            LlmMessage::user(format!(
                "Summarize the following material in 5-8 sentences:\n\n{}",
                context.prompt
            )),
        ]
    }
}

#[async_trait::async_trait]
impl PlanAgent for SummarizerAgent {
    fn name(&self) -> &str {
        "summarizer"
    }

    async fn run(&self, context: &PlanAgentContext) -> Result<AgentResult> {
        let messages = Self::build_messages(context);
        let result = self
            .tiered
            .call(LlmTier::Light, &messages, &CompletionOptions::new(0.3))
            .await?;

        let mut output = HashMap::new();
        output.insert("summary".to_string(), json!(result.content));

        Ok(AgentResult::completed(self.name(), result.content.clone())
            .with_output(output)
            .with_usage(result.model_alias, result.input_tokens, result.output_tokens))
    }
}

/// Pulls fresh context from the web through the search tier.
pub struct ResearcherAgent {
    tiered: Arc<TieredClient>,
}

impl ResearcherAgent {
    pub fn new(tiered: Arc<TieredClient>) -> Self {
        Self { tiered }
    }
}

#[async_trait::async_trait]
impl PlanAgent for ResearcherAgent {
    fn name(&self) -> &str {
        "researcher"
    }

    async fn run(&self, context: &PlanAgentContext) -> Result<AgentResult> {
        let messages = vec![
            LlmMessage::system("You gather the latest information from the web."),
            LlmMessage::user(context.prompt.clone()),
        ];

        let result = self
            .tiered
            .call(LlmTier::Search, &messages, &CompletionOptions::new(0.2))
            .await?;

        let mut output = HashMap::new();
        output.insert("search_results".to_string(), json!(result.content));

        Ok(AgentResult::completed(self.name(), result.content.clone())
            .with_output(output)
            .with_usage(result.model_alias, result.input_tokens, result.output_tokens))
    }
}

static TITLE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("static regex compiles"));

/// Synthesizes every prior output into the final markdown draft. The
/// plan executor treats this agent's output as the run's final output.
pub struct WriterAgent {
    tiered: Arc<TieredClient>,
}

impl WriterAgent {
    pub fn new(tiered: Arc<TieredClient>) -> Self {
        Self { tiered }
    }

    fn build_messages(context: &PlanAgentContext) -> Vec<LlmMessage> {
        let mut context_parts: Vec<String> = Vec::new();

        // Every earlier agent's string outputs become labeled context.
        let mut previous: Vec<(String, Value)> =
            context.previous_outputs().into_iter().collect();
        previous.sort_by(|a, b| a.0.cmp(&b.0));
        for (agent_name, output) in previous {
            if let Value::Object(map) = output {
                for (key, value) in map {
                    if let Value::String(text) = value {
                        if !text.is_empty() {
                            context_parts.push(format!("## {agent_name} - {key}\n{text}"));
                        }
                    }
                }
            }
        }

        if let Some(Value::Array(contents)) = context.additional_data.get("selected_contents") {
            if !contents.is_empty() {
                context_parts.push("## Reference contents".to_string());
                for content in contents {
                    let title = content.get("title").and_then(Value::as_str).unwrap_or("");
                    let summary = content.get("summary").and_then(Value::as_str).unwrap_or("");
                    if !title.is_empty() && !summary.is_empty() {
                        context_parts.push(format!("### {title}\n{summary}\n"));
                    }
                }
            }
        }

        let context_text = if context_parts.is_empty() {
            "No context available.".to_string()
        } else {
            context_parts.join("\n\n")
        };

        vec![
            LlmMessage::system(
                "You write well-structured markdown drafts. Start with a single \
                 top-level heading that works as the title.",
            ),
            LlmMessage::user(format!(
                "Write a draft for this request:\n{}\n\nContext:\n{}",
                context.prompt, context_text
            )),
        ]
    }

    fn extract_title(content: &str) -> String {
        if let Some(captures) = TITLE_HEADER.captures(content) {
            return captures[1].trim().to_string();
        }

        let first_line = content.lines().next().unwrap_or("").trim();
        if first_line.chars().count() > 50 {
            let prefix: String = first_line.chars().take(50).collect();
            format!("{prefix}...")
        } else {
            first_line.to_string()
        }
    }
}

#[async_trait::async_trait]
impl PlanAgent for WriterAgent {
    fn name(&self) -> &str {
        "writer"
    }

    async fn run(&self, context: &PlanAgentContext) -> Result<AgentResult> {
        let messages = Self::build_messages(context);
        let result = self
            .tiered
            .call(LlmTier::Standard, &messages, &CompletionOptions::new(0.7))
            .await?;

        let title = Self::extract_title(&result.content);
        let mut output = HashMap::new();
        output.insert("draft_md".to_string(), json!(result.content));
        output.insert("title".to_string(), json!(title));

        Ok(AgentResult::completed(self.name(), result.content.clone())
            .with_output(output)
            .with_usage(result.model_alias, result.input_tokens, result.output_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_from_header() {
        assert_eq!(
            WriterAgent::extract_title("# Rust in Production\n\nBody"),
            "Rust in Production"
        );
    }

    #[test]
    fn test_extract_title_without_header() {
        assert_eq!(WriterAgent::extract_title("short draft"), "short draft");

        let long_line = "x".repeat(80);
        let title = WriterAgent::extract_title(&long_line);
        assert!(title.ends_with("..."));
        assert_eq!(title.len(), 53);
    }

    #[test]
    fn test_writer_context_includes_previous_outputs() {
        let mut additional_data = HashMap::new();
        additional_data.insert(
            "previous_outputs".to_string(),
            json!({ "summarizer": { "summary": "the summary text" } }),
        );

        let context = PlanAgentContext {
            request_id: "r1".into(),
            user_id: 1,
            prompt: "write about rust".into(),
            additional_data,
        };

        let messages = WriterAgent::build_messages(&context);
        assert!(messages[1].content.contains("summarizer - summary"));
        assert!(messages[1].content.contains("the summary text"));
    }
}
