//! Coordinates multi-agent chains and parallel fan-outs.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::base::{AgentHarness, AgentResponse, AiAgent};
use super::context::AgentContext;
use crate::domain::{QualityPreference, UserModelPreferences};

/// Aggregate of every agent response in one coordinated run.
#[derive(Debug)]
pub struct CoordinatedResponse {
    pub session_id: String,
    pub agent_responses: Vec<(String, AgentResponse)>,
    pub final_content: Value,
    pub metadata: serde_json::Map<String, Value>,
    pub total_wtu_consumed: i64,
    pub total_cost_usd: f64,
    pub total_execution_time_ms: i64,
    /// Conjunction of all executed agents' successes.
    pub success: bool,
    pub error_messages: Vec<String>,
    pub warnings: Vec<String>,
}

impl CoordinatedResponse {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            agent_responses: Vec::new(),
            final_content: Value::Null,
            metadata: serde_json::Map::new(),
            total_wtu_consumed: 0,
            total_cost_usd: 0.0,
            total_execution_time_ms: 0,
            success: true,
            error_messages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_agent_response(&mut self, agent_name: &str, response: AgentResponse) {
        self.total_wtu_consumed += response.wtu_consumed;
        self.total_cost_usd += response.cost_usd;
        self.total_execution_time_ms += response.execution_time_ms;

        if !response.success {
            self.success = false;
            if let Some(message) = &response.error_message {
                self.error_messages.push(format!("{agent_name}: {message}"));
            }
        }

        self.agent_responses.push((agent_name.to_string(), response));
    }

    fn finalize(&mut self, final_content: Value, extra: serde_json::Map<String, Value>) {
        self.final_content = final_content;
        self.metadata.extend(extra);

        let executed = self.agent_responses.len();
        let successes = self
            .agent_responses
            .iter()
            .filter(|(_, r)| r.success)
            .count();

        self.metadata.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        self.metadata
            .insert("total_agents".to_string(), json!(executed));
        self.metadata.insert(
            "execution_summary".to_string(),
            json!({
                "total_wtu_consumed": self.total_wtu_consumed,
                "total_cost_usd": self.total_cost_usd,
                "total_execution_time_ms": self.total_execution_time_ms,
                "success_rate": if executed > 0 {
                    successes as f64 / executed as f64
                } else {
                    0.0
                },
            }),
        );
    }

    pub fn agents_used(&self) -> Vec<String> {
        self.agent_responses
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn error_message(&self) -> Option<String> {
        if self.error_messages.is_empty() {
            None
        } else {
            Some(self.error_messages.join("; "))
        }
    }
}

/// Registry of agents by type plus the chain/parallel executors.
pub struct AgentCoordinator {
    agents: std::sync::RwLock<HashMap<String, Arc<dyn AiAgent>>>,
    harness: AgentHarness,
}

impl AgentCoordinator {
    pub fn new(harness: AgentHarness) -> Self {
        Self {
            agents: std::sync::RwLock::new(HashMap::new()),
            harness,
        }
    }

    pub fn register_agent(&self, agent: Arc<dyn AiAgent>) {
        let agent_type = agent.agent_type().to_string();
        info!(%agent_type, name = agent.agent_name(), "Registered agent");
        self.agents
            .write()
            .expect("agent registry poisoned")
            .insert(agent_type, agent);
    }

    pub fn available_agents(&self) -> Vec<String> {
        self.agents
            .read()
            .expect("agent registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn agent(&self, agent_type: &str) -> Option<Arc<dyn AiAgent>> {
        self.agents
            .read()
            .expect("agent registry poisoned")
            .get(agent_type)
            .cloned()
    }

    /// Run agents in order, threading each successful output into the
    /// next input. Individual failures don't stop the chain; missing
    /// agent types are skipped with a warning.
    pub async fn execute_agent_chain(
        &self,
        agent_chain: &[String],
        initial_input: Value,
        context: &AgentContext,
    ) -> CoordinatedResponse {
        let session_id = Uuid::new_v4().to_string();
        let mut coordinated = CoordinatedResponse::new(session_id.clone());

        info!(?agent_chain, %session_id, "Starting agent chain execution");

        let mut current_input = match initial_input {
            Value::Object(map) => Value::Object(map),
            other => json!({ "input": other }),
        };

        for agent_type in agent_chain {
            let Some(agent) = self.agent(agent_type) else {
                let warning = format!("Agent type '{agent_type}' not registered");
                warn!("{warning}");
                coordinated.warnings.push(warning);
                continue;
            };

            let response = self
                .harness
                .process_with_wtu(agent.as_ref(), &current_input, context)
                .await;

            if response.success {
                // Map outputs merge into the next input; everything else
                // travels under previous_output.
                match &response.content {
                    Value::Object(map) => {
                        if let Value::Object(input) = &mut current_input {
                            for (key, value) in map {
                                input.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    other => {
                        if let Value::Object(input) = &mut current_input {
                            input.insert("previous_output".to_string(), other.clone());
                        }
                    }
                }
                info!(%agent_type, wtu = response.wtu_consumed, "Chain agent completed");
            } else {
                warn!(%agent_type, error = ?response.error_message, "Chain agent failed");
            }

            coordinated.add_agent_response(agent.agent_name(), response);
        }

        let final_content = coordinated
            .agent_responses
            .last()
            .map(|(_, r)| r.content.clone())
            .unwrap_or(Value::Null);

        let mut extra = serde_json::Map::new();
        extra.insert("chain_execution".to_string(), Value::Bool(true));
        extra.insert("agent_chain".to_string(), json!(agent_chain));
        coordinated.finalize(final_content, extra);

        info!(
            %session_id,
            success = coordinated.success,
            total_wtu = coordinated.total_wtu_consumed,
            "Agent chain completed"
        );

        coordinated
    }

    /// Run independent (agent, input) pairs concurrently and collect a
    /// map of agent name to content.
    pub async fn execute_parallel_agents(
        &self,
        agent_tasks: Vec<(String, Value)>,
        context: &AgentContext,
    ) -> CoordinatedResponse {
        let session_id = Uuid::new_v4().to_string();
        let mut coordinated = CoordinatedResponse::new(session_id.clone());

        info!(
            agents = agent_tasks.len(),
            %session_id, "Starting parallel agent execution"
        );

        let mut runnable = Vec::new();
        for (agent_type, input) in agent_tasks {
            match self.agent(&agent_type) {
                Some(agent) => runnable.push((agent, input)),
                None => {
                    let warning = format!("Agent type '{agent_type}' not registered");
                    warn!("{warning}");
                    coordinated.warnings.push(warning);
                }
            }
        }

        let results = join_all(runnable.iter().map(|(agent, input)| {
            self.harness
                .process_with_wtu(agent.as_ref(), input, context)
        }))
        .await;

        let mut parallel_results = serde_json::Map::new();
        for ((agent, _), response) in runnable.iter().zip(results) {
            if response.success {
                parallel_results.insert(agent.agent_name().to_string(), response.content.clone());
            }
            coordinated.add_agent_response(agent.agent_name(), response);
        }

        let mut extra = serde_json::Map::new();
        extra.insert("parallel_execution".to_string(), Value::Bool(true));
        coordinated.finalize(Value::Object(parallel_results), extra);

        info!(
            %session_id,
            success = coordinated.success,
            total_wtu = coordinated.total_wtu_consumed,
            "Parallel execution completed"
        );

        coordinated
    }

    /// Default chain per task type, adjusted for complexity and quality
    /// preference, filtered to registered agents.
    pub fn build_agent_chain(
        &self,
        task_type: &str,
        complexity: u8,
        preferences: &UserModelPreferences,
    ) -> Vec<String> {
        let mut chain: Vec<String> = match task_type {
            "board_analysis" | "clipper" => {
                vec!["content_analysis".into(), "summary_generation".into()]
            }
            "summary" => vec!["summary_generation".into()],
            "content_analysis" => vec!["content_analysis".into()],
            "validation" => vec!["validator".into()],
            _ => vec!["content_analysis".into()],
        };

        if (complexity >= 3 || preferences.quality_preference == QualityPreference::Quality)
            && !chain.iter().any(|a| a == "validator")
        {
            chain.push("validator".into());
        }

        let registered = self.agents.read().expect("agent registry poisoned");
        let filtered: Vec<String> = chain
            .into_iter()
            .filter(|agent_type| registered.contains_key(agent_type))
            .collect();

        info!(task_type, ?filtered, "Built agent chain");
        filtered
    }
}
