//! Entry point that routes a request to the agent or legacy path.
//!
//! The mode selector decides; the router enforces quota admission
//! before any LLM work, executes the chosen path, falls back from
//! agent to legacy exactly once when allowed, and keeps thread-safe
//! per-mode statistics for the health surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::legacy_adapter::LegacyAdapter;
use super::mode_selector::{
    ProcessingMode, ProcessingModeRequest, ProcessingModeResponse, ProcessingModeService,
    SelectedMode,
};
use crate::accounting::WtuAccountant;
use crate::agents::{AgentContextManager, AgentCoordinator, ContextOptions};
use crate::domain::{current_plan_month, ClipOpsError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct RoutingResult {
    pub mode_used: String,
    pub processing_result: Value,
    pub execution_time_ms: i64,
    pub wtu_consumed: i64,
    pub success: bool,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModeSuccess {
    pub success: u64,
    pub total: u64,
}

impl ModeSuccess {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingStats {
    pub total_requests: u64,
    pub legacy_count: u64,
    pub agent_count: u64,
    pub fallback_count: u64,
    pub success_by_mode: HashMap<String, ModeSuccess>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterHealth {
    pub router_status: String,
    pub legacy_adapter_status: String,
    pub agent_coordinator_status: String,
    pub available_agents: Vec<String>,
    pub overall_status: String,
}

pub struct SmartRouter {
    mode_selector: Arc<ProcessingModeService>,
    coordinator: Arc<AgentCoordinator>,
    context_manager: Arc<AgentContextManager>,
    legacy_adapter: Arc<dyn LegacyAdapter>,
    accountant: Arc<WtuAccountant>,
    stats: Mutex<RoutingStats>,
}

impl SmartRouter {
    pub fn new(
        mode_selector: Arc<ProcessingModeService>,
        coordinator: Arc<AgentCoordinator>,
        context_manager: Arc<AgentContextManager>,
        legacy_adapter: Arc<dyn LegacyAdapter>,
        accountant: Arc<WtuAccountant>,
    ) -> Self {
        Self {
            mode_selector,
            coordinator,
            context_manager,
            legacy_adapter,
            accountant,
            stats: Mutex::new(RoutingStats::default()),
        }
    }

    fn bump(&self, f: impl FnOnce(&mut RoutingStats)) {
        let mut stats = self.stats.lock().expect("routing stats poisoned");
        f(&mut stats);
    }

    fn record_mode_outcome(&self, mode: &str, success: bool) {
        self.bump(|stats| {
            let entry = stats.success_by_mode.entry(mode.to_string()).or_default();
            entry.total += 1;
            if success {
                entry.success += 1;
            }
        });
    }

    /// Route and execute one request end to end.
    ///
    /// Quota problems surface as `QuotaExceeded` before any LLM call;
    /// execution failures are folded into the returned result.
    pub async fn route(
        &self,
        request_type: &str,
        request_data: Value,
        user_id: i64,
        board_id: Option<i64>,
        processing_mode: ProcessingMode,
    ) -> Result<RoutingResult> {
        let started = Instant::now();
        self.bump(|stats| stats.total_requests += 1);

        info!(request_type, ?processing_mode, user_id, "Routing request");

        let decision = self
            .decide(request_type, &request_data, user_id, board_id, processing_mode)
            .await;

        info!(
            mode = decision.selected_mode.as_str(),
            reason = %decision.reason,
            "Mode decision"
        );

        // Admission control: the estimate must fit the remaining budget
        // before any model is called.
        let estimated_wtu = decision.estimated_wtu.ceil() as i64;
        self.accountant
            .ensure_can_consume(user_id, current_plan_month(), estimated_wtu)
            .await?;

        let mut fallback_used = false;
        let mut mode_used = decision.selected_mode;

        let outcome = match decision.selected_mode {
            SelectedMode::Agent => {
                self.bump(|stats| stats.agent_count += 1);
                match self
                    .process_with_agents(request_type, &request_data, user_id, board_id)
                    .await
                {
                    Ok(result) => Ok(result),
                    Err(agent_error) if decision.fallback_available => {
                        warn!(error = %agent_error, "Agent path failed, attempting legacy fallback");
                        match self
                            .process_with_legacy(request_type, &request_data, user_id, board_id)
                            .await
                        {
                            Ok(result) => {
                                fallback_used = true;
                                mode_used = SelectedMode::Legacy;
                                self.bump(|stats| stats.fallback_count += 1);
                                info!("Fallback to legacy mode successful");
                                Ok(result)
                            }
                            Err(fallback_error) => {
                                error!(error = %fallback_error, "Legacy fallback also failed");
                                Err(fallback_error)
                            }
                        }
                    }
                    Err(agent_error) => Err(agent_error),
                }
            }
            SelectedMode::Legacy => {
                self.bump(|stats| stats.legacy_count += 1);
                self.process_with_legacy(request_type, &request_data, user_id, board_id)
                    .await
            }
        };

        let execution_time_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(processing_result) => {
                let success = processing_result
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let wtu_consumed = processing_result
                    .get("wtu_consumed")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let error_message = processing_result
                    .get("error_message")
                    .and_then(Value::as_str)
                    .map(String::from);

                self.record_mode_outcome(mode_used.as_str(), success);

                Ok(RoutingResult {
                    mode_used: mode_used.as_str().to_string(),
                    processing_result,
                    execution_time_ms,
                    wtu_consumed,
                    success,
                    fallback_used,
                    error_message,
                })
            }
            Err(e) => {
                error!(error = %e, "Request routing failed");
                self.record_mode_outcome(mode_used.as_str(), false);

                Ok(RoutingResult {
                    mode_used: "error".to_string(),
                    processing_result: Value::Object(Default::default()),
                    execution_time_ms,
                    wtu_consumed: 0,
                    success: false,
                    fallback_used,
                    error_message: Some(e.to_string()),
                })
            }
        }
    }

    /// Ask the selector; selector failures degrade to a safe legacy
    /// decision inside the selector itself.
    async fn decide(
        &self,
        request_type: &str,
        request_data: &Value,
        user_id: i64,
        board_id: Option<i64>,
        processing_mode: ProcessingMode,
    ) -> ProcessingModeResponse {
        let request = ProcessingModeRequest {
            user_id,
            board_id,
            task_type: request_type.to_string(),
            mode: processing_mode,
            complexity_preference: request_data
                .get("complexity_preference")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_value(Value::String(s.to_string())).ok())
                .unwrap_or_default(),
            quality_threshold: request_data
                .get("quality_threshold")
                .and_then(Value::as_f64)
                .unwrap_or(0.85),
            budget_limit_wtu: request_data.get("budget_limit_wtu").and_then(Value::as_i64),
            user_preferences: None,
        };

        self.mode_selector.select_processing_mode(&request).await
    }

    async fn process_with_agents(
        &self,
        request_type: &str,
        request_data: &Value,
        user_id: i64,
        board_id: Option<i64>,
    ) -> Result<Value> {
        let complexity = request_data
            .get("complexity")
            .and_then(Value::as_u64)
            .map(|c| c as u8)
            .unwrap_or(2);

        let coordinator = Arc::clone(&self.coordinator);
        let task_type = request_type.to_string();
        let request_type = request_type.to_string();
        let request_data = request_data.clone();

        Arc::clone(&self.context_manager)
            .with_context(
                user_id,
                &task_type,
                ContextOptions {
                    board_id,
                    complexity,
                    ..Default::default()
                },
                move |context| async move {
                    let chain = coordinator.build_agent_chain(
                        &request_type,
                        context.complexity,
                        &context.user_preferences,
                    );
                    if chain.is_empty() {
                        return Err(ClipOpsError::internal(format!(
                            "no suitable agent chain for request type '{request_type}'"
                        )));
                    }

                    let coordinated = coordinator
                        .execute_agent_chain(&chain, request_data, &context)
                        .await;

                    // A chain where nothing succeeded is a hard failure
                    // and eligible for legacy fallback; partial failures
                    // return success=false to the caller instead.
                    let executed = coordinated.agent_responses.len();
                    let succeeded = coordinated
                        .agent_responses
                        .iter()
                        .filter(|(_, r)| r.success)
                        .count();
                    if executed > 0 && succeeded == 0 {
                        return Err(ClipOpsError::internal(
                            coordinated
                                .error_message()
                                .unwrap_or_else(|| "agent chain produced no result".to_string()),
                        ));
                    }

                    let mut result = json!({
                        "success": coordinated.success,
                        "content": coordinated.final_content.clone(),
                        "metadata": Value::Object(coordinated.metadata.clone()),
                        "wtu_consumed": coordinated.total_wtu_consumed,
                        "execution_time_ms": coordinated.total_execution_time_ms,
                        "agents_used": coordinated.agents_used(),
                        "warnings": coordinated.warnings.clone(),
                        "mode": "agent",
                    });
                    if let Some(message) = coordinated.error_message() {
                        result["error_message"] = Value::String(message);
                    }
                    Ok(result)
                },
            )
            .await
    }

    async fn process_with_legacy(
        &self,
        request_type: &str,
        request_data: &Value,
        user_id: i64,
        board_id: Option<i64>,
    ) -> Result<Value> {
        let mut result = self
            .legacy_adapter
            .process_request(request_type, request_data, user_id, board_id)
            .await?;

        if let Value::Object(map) = &mut result {
            map.insert("mode".to_string(), Value::String("legacy".to_string()));
        }
        Ok(result)
    }

    pub fn routing_stats(&self) -> RoutingStats {
        self.stats.lock().expect("routing stats poisoned").clone()
    }

    pub async fn health_check(&self) -> RouterHealth {
        let legacy_healthy = self.legacy_adapter.ping().await.is_ok();
        let available_agents = self.coordinator.available_agents();
        let coordinator_healthy = !available_agents.is_empty();

        let overall = match (legacy_healthy, coordinator_healthy) {
            (true, true) => "healthy",
            (false, false) => "unhealthy",
            _ => "degraded",
        };

        RouterHealth {
            router_status: if overall == "unhealthy" {
                "degraded".to_string()
            } else {
                "healthy".to_string()
            },
            legacy_adapter_status: if legacy_healthy {
                "healthy".to_string()
            } else {
                "unhealthy".to_string()
            },
            agent_coordinator_status: if coordinator_healthy {
                "healthy".to_string()
            } else {
                "no_agents".to_string()
            },
            available_agents,
            overall_status: overall.to_string(),
        }
    }
}
