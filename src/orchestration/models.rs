//! Declarative execution plan types shared between the planner and the
//! executor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where stage agents may pull context from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Auto,
    RagOnly,
    WebOnly,
    Both,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Auto => "auto",
            RetrievalMode::RagOnly => "rag_only",
            RetrievalMode::WebOnly => "web_only",
            RetrievalMode::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Draft,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Agent entry inside a plan stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

impl AgentSpec {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: None,
            options: HashMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One stage of a plan; `index` is 1-based and defines ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStage {
    pub index: i64,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub retrieval_mode: RetrievalMode,
    #[serde(default)]
    pub stages: Vec<PlanStage>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUsage {
    pub model: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub wtu: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_wtu: i64,
    pub agents: HashMap<String, AgentUsage>,
}

/// Outcome of one agent in one plan run. Frozen once the agent returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: String,
    pub status: AgentExecutionStatus,
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl AgentResult {
    pub fn completed(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            status: AgentExecutionStatus::Completed,
            success: true,
            skipped: false,
            warning: None,
            content: Some(content.into()),
            output: None,
            error: None,
            model: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn failed(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            status: AgentExecutionStatus::Failed,
            success: false,
            skipped: false,
            warning: None,
            content: None,
            output: None,
            error: Some(error.into()),
            model: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn skipped(agent: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            status: AgentExecutionStatus::Skipped,
            success: false,
            skipped: true,
            warning: Some(warning.into()),
            content: None,
            output: None,
            error: None,
            model: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn with_output(mut self, output: HashMap<String, Value>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_usage(mut self, model: impl Into<String>, input: i64, output: i64) -> Self {
        self.model = Some(model.into());
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub results: Vec<AgentResult>,
    pub usage: UsageSummary,
    pub final_output: HashMap<String, Value>,
    pub warnings: Vec<String>,
}

/// Request-wide context shared by every stage of one plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationContext {
    pub request_id: String,
    pub user_id: i64,
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub selected_contents: Vec<Value>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl OrchestrationContext {
    pub fn new(request_id: impl Into<String>, user_id: i64) -> Self {
        Self {
            request_id: request_id.into(),
            user_id,
            topic_id: None,
            prompt: None,
            selected_contents: Vec::new(),
            stream: false,
            verbose: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Per-agent view assembled by the executor: the request context plus
/// the accumulated outputs of earlier stages.
#[derive(Debug, Clone)]
pub struct PlanAgentContext {
    pub request_id: String,
    pub user_id: i64,
    pub prompt: String,
    pub additional_data: HashMap<String, Value>,
}

impl PlanAgentContext {
    /// Outputs of previously completed agents, keyed by agent name.
    pub fn previous_outputs(&self) -> HashMap<String, Value> {
        match self.additional_data.get("previous_outputs") {
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            _ => HashMap::new(),
        }
    }
}

/// Event frame pushed to SSE subscribers during plan execution.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub event: String,
    pub data: Value,
}

pub type EventSender = tokio::sync::mpsc::Sender<StreamEvent>;
