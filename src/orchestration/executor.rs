//! Executes a declarative `ExecutionPlan`.
//!
//! Stages run in ascending index order with a hard barrier between
//! stages; agents inside a stage run concurrently when the stage says
//! so. Each agent sees the accumulated outputs of all earlier stages
//! under `previous_outputs`. An optional event channel receives
//! progress frames; its absence never changes execution semantics.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::agents::PlanAgent;
use super::models::{
    AgentResult, AgentUsage, EventSender, ExecutionPlan, ExecutionResult, OrchestrationContext,
    PlanAgentContext, PlanStage, StreamEvent, UsageSummary,
};
use crate::accounting::{wtu_from_tokens, WtuAccountant};
use crate::domain::Result;
use rust_decimal::Decimal;

pub struct PlanExecutor {
    agents: std::sync::RwLock<HashMap<String, Arc<dyn PlanAgent>>>,
    accountant: Arc<WtuAccountant>,
}

impl PlanExecutor {
    pub fn new(accountant: Arc<WtuAccountant>) -> Self {
        Self {
            agents: std::sync::RwLock::new(HashMap::new()),
            accountant,
        }
    }

    pub fn register_agent(&self, agent: Arc<dyn PlanAgent>) {
        info!(agent = agent.name(), "Registering plan agent");
        self.agents
            .write()
            .expect("plan agent registry poisoned")
            .insert(agent.name().to_string(), agent);
    }

    pub fn registered_agents(&self) -> Vec<String> {
        self.agents
            .read()
            .expect("plan agent registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn agent(&self, name: &str) -> Option<Arc<dyn PlanAgent>> {
        self.agents
            .read()
            .expect("plan agent registry poisoned")
            .get(name)
            .cloned()
    }

    async fn emit(events: &Option<EventSender>, event: &str, data: Value) {
        if let Some(sender) = events {
            // A gone subscriber must not affect execution
            let _ = sender
                .send(StreamEvent {
                    event: event.to_string(),
                    data,
                })
                .await;
        }
    }

    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        context: &OrchestrationContext,
        events: Option<EventSender>,
    ) -> Result<ExecutionResult> {
        info!(
            plan_id = %plan.plan_id,
            stages = plan.stages.len(),
            "Starting plan execution"
        );

        Self::emit(
            &events,
            "plan",
            json!({
                "plan_id": plan.plan_id,
                "retrieval_mode": plan.retrieval_mode.as_str(),
                "stages": plan.stages.iter().map(|stage| json!({
                    "index": stage.index,
                    "parallel": stage.parallel,
                    "agents": stage.agents.iter().map(|spec| json!({
                        "agent": spec.agent,
                        "reason": spec.reason,
                    })).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            }),
        )
        .await;

        let mut stages: Vec<&PlanStage> = plan.stages.iter().collect();
        stages.sort_by_key(|stage| stage.index);

        let mut results: Vec<AgentResult> = Vec::new();
        let mut accumulated_outputs: serde_json::Map<String, Value> = serde_json::Map::new();

        for stage in stages {
            Self::emit(
                &events,
                "status",
                json!({
                    "stage": stage.index,
                    "parallel": stage.parallel,
                    "agents": stage.agents.iter().map(|s| s.agent.clone()).collect::<Vec<_>>(),
                }),
            )
            .await;

            let stage_results = self
                .run_stage(stage, context, &accumulated_outputs, &events)
                .await;

            // Outputs land in deterministic spec order at stage end,
            // regardless of completion order inside a parallel stage.
            for result in &stage_results {
                if let Some(output) = &result.output {
                    accumulated_outputs.insert(
                        result.agent.clone(),
                        Value::Object(output.clone().into_iter().collect()),
                    );
                }
            }
            results.extend(stage_results);
        }

        let warnings: Vec<String> = results
            .iter()
            .filter_map(|result| result.warning.clone())
            .collect();

        // The writer's output is the run's final output; plans without a
        // writer produce an empty map.
        let final_output = results
            .iter()
            .find(|result| result.agent == "writer")
            .and_then(|result| result.output.clone())
            .unwrap_or_default();

        let usage = self.calculate_usage(&results).await;

        info!(
            plan_id = %plan.plan_id,
            total_wtu = usage.total_wtu,
            final_output_keys = ?final_output.keys().collect::<Vec<_>>(),
            "Plan execution finished"
        );

        Ok(ExecutionResult {
            plan_id: plan.plan_id.clone(),
            results,
            usage,
            final_output,
            warnings,
        })
    }

    fn agent_context(
        &self,
        context: &OrchestrationContext,
        accumulated_outputs: &serde_json::Map<String, Value>,
    ) -> PlanAgentContext {
        let mut additional_data = HashMap::new();
        additional_data.insert(
            "selected_contents".to_string(),
            Value::Array(context.selected_contents.clone()),
        );
        additional_data.insert(
            "metadata".to_string(),
            Value::Object(context.metadata.clone().into_iter().collect()),
        );
        additional_data.insert(
            "previous_outputs".to_string(),
            Value::Object(accumulated_outputs.clone()),
        );

        PlanAgentContext {
            request_id: context.request_id.clone(),
            user_id: context.user_id,
            prompt: context.prompt.clone().unwrap_or_default(),
            additional_data,
        }
    }

    async fn run_one(
        &self,
        agent: Arc<dyn PlanAgent>,
        agent_context: PlanAgentContext,
        stage_index: i64,
        events: &Option<EventSender>,
    ) -> AgentResult {
        Self::emit(
            events,
            "agent_start",
            json!({ "agent": agent.name(), "stage": stage_index }),
        )
        .await;

        let result = match agent.run(&agent_context).await {
            Ok(result) => result,
            Err(e) => {
                warn!(agent = agent.name(), error = %e, "Plan agent failed");
                AgentResult::failed(agent.name(), e.to_string())
            }
        };

        Self::emit(
            events,
            "agent_done",
            json!({
                "agent": agent.name(),
                "stage": stage_index,
                "success": result.success,
                "skipped": result.skipped,
            }),
        )
        .await;

        result
    }

    async fn run_stage(
        &self,
        stage: &PlanStage,
        context: &OrchestrationContext,
        accumulated_outputs: &serde_json::Map<String, Value>,
        events: &Option<EventSender>,
    ) -> Vec<AgentResult> {
        // Resolve registry entries first so skipped results keep their
        // position in the stage's agent order.
        let mut resolved: Vec<std::result::Result<Arc<dyn PlanAgent>, AgentResult>> = Vec::new();
        for spec in &stage.agents {
            match self.agent(&spec.agent) {
                Some(agent) => resolved.push(Ok(agent)),
                None => {
                    warn!(agent = %spec.agent, "Agent not registered, skipping execution");
                    resolved.push(Err(AgentResult::skipped(
                        &spec.agent,
                        "Agent not registered",
                    )));
                }
            }
        }

        if stage.parallel {
            let futures: Vec<_> = resolved
                .into_iter()
                .map(|entry| {
                    let agent_context = self.agent_context(context, accumulated_outputs);
                    async move {
                        match entry {
                            Ok(agent) => {
                                self.run_one(agent, agent_context, stage.index, events).await
                            }
                            Err(skipped) => skipped,
                        }
                    }
                })
                .collect();
            join_all(futures).await
        } else {
            let mut results = Vec::new();
            for entry in resolved {
                match entry {
                    Ok(agent) => {
                        let agent_context = self.agent_context(context, accumulated_outputs);
                        results
                            .push(self.run_one(agent, agent_context, stage.index, events).await);
                    }
                    Err(skipped) => results.push(skipped),
                }
            }
            results
        }
    }

    /// Per-agent and total usage over successful, non-skipped results,
    /// using the catalog's multipliers per model.
    async fn calculate_usage(&self, results: &[AgentResult]) -> UsageSummary {
        let mut summary = UsageSummary::default();

        for result in results {
            if !result.success || result.skipped {
                continue;
            }

            let wtu = match &result.model {
                Some(model) => self
                    .accountant
                    .compute_wtu(result.input_tokens, result.output_tokens, model)
                    .await
                    .unwrap_or_else(|_| {
                        wtu_from_tokens(
                            result.input_tokens,
                            result.output_tokens,
                            Decimal::ONE,
                            Decimal::ONE,
                        )
                    }),
                None => wtu_from_tokens(
                    result.input_tokens,
                    result.output_tokens,
                    Decimal::ONE,
                    Decimal::ONE,
                ),
            };

            summary.total_input_tokens += result.input_tokens;
            summary.total_output_tokens += result.output_tokens;
            summary.total_wtu += wtu;
            summary.agents.insert(
                result.agent.clone(),
                AgentUsage {
                    model: result.model.clone(),
                    input_tokens: result.input_tokens,
                    output_tokens: result.output_tokens,
                    wtu,
                },
            );
        }

        summary
    }
}
