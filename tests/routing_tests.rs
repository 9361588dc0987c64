//! Smart router: mode execution, agent-to-legacy fallback, stats and
//! health reporting.

mod helpers;

use std::sync::Arc;

use clip_ops::agents::{AgentCoordinator, AgentHarness};
use clip_ops::domain::Result;
use clip_ops::routing::{
    LegacyAdapter, ProcessingMode, ProcessingModeService, SmartRouter,
    SummarizationLegacyAdapter,
};
use clip_ops::testing::ScriptedGateway;
use helpers::{app_with_gateway, queue_pipeline, test_app};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn agent_leaning_request(content: &str) -> Value {
    json!({
        "content": content,
        "complexity": 2,
        "complexity_preference": "thorough",
        "quality_threshold": 0.97,
    })
}

#[tokio::test]
async fn legacy_path_serves_default_requests() {
    let app = test_app().await;
    queue_pipeline(&app.gateway, "a summary", r#"["tag"]"#, r#"["Category"]"#);

    let result = app
        .state
        .router
        .route(
            "summary",
            json!({ "content": "page text" }),
            1,
            None,
            ProcessingMode::Auto,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.mode_used, "legacy");
    assert!(!result.fallback_used);
    assert_eq!(result.processing_result["mode"], json!("legacy"));
    assert_eq!(result.processing_result["summary"], json!("a summary"));

    let stats = app.state.router.routing_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.legacy_count, 1);
    assert_eq!(stats.agent_count, 0);
    assert_eq!(stats.success_by_mode["legacy"].success, 1);
}

#[tokio::test]
async fn agent_path_runs_the_chain() {
    let app = test_app().await;

    let result = app
        .state
        .router
        .route(
            "board_analysis",
            agent_leaning_request("content worth analyzing"),
            1,
            Some(10),
            ProcessingMode::Auto,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.mode_used, "agent");
    assert!(!result.fallback_used);

    let agents = result.processing_result["agents_used"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    // Two chain agents, 1200+300 baseline tokens each
    assert_eq!(result.wtu_consumed, 4);

    let stats = app.state.router.routing_stats();
    assert_eq!(stats.agent_count, 1);
    assert_eq!(stats.fallback_count, 0);
}

#[tokio::test]
async fn agent_failure_falls_back_to_legacy_once() {
    // The harness selects the light tier's head model for simple work;
    // failing it kills the agent path while the legacy pipeline can
    // still fall through to the rest of the tier.
    let app = app_with_gateway(ScriptedGateway::failing_models(&["light-a"])).await;
    queue_pipeline(&app.gateway, "fallback summary", r#"["tag"]"#, r#"["Category"]"#);

    let result = app
        .state
        .router
        .route(
            "summary",
            agent_leaning_request("some content"),
            1,
            None,
            ProcessingMode::Auto,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.mode_used, "legacy");
    assert!(result.fallback_used);
    assert_eq!(result.processing_result["summary"], json!("fallback summary"));

    let stats = app.state.router.routing_stats();
    assert_eq!(stats.fallback_count, 1);
    assert_eq!(stats.agent_count, 1);
    assert_eq!(stats.success_by_mode["legacy"].success, 1);
}

#[tokio::test]
async fn explicit_legacy_mode_skips_the_agent_path() {
    let app = test_app().await;
    queue_pipeline(&app.gateway, "s", r#"["t"]"#, r#"["C"]"#);

    let result = app
        .state
        .router
        .route(
            "summary",
            agent_leaning_request("content"),
            1,
            None,
            ProcessingMode::Legacy,
        )
        .await
        .unwrap();

    assert_eq!(result.mode_used, "legacy");
    assert_eq!(app.state.router.routing_stats().agent_count, 0);
}

#[tokio::test]
async fn unroutable_request_reports_an_error_result() {
    let app = test_app().await;

    let result = app
        .state
        .router
        .route(
            "unknown_request_kind",
            json!({ "content": "text" }),
            1,
            None,
            ProcessingMode::Legacy,
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.mode_used, "error");
    assert!(result.error_message.is_some());
}

#[tokio::test]
async fn healthy_router_reports_both_paths() {
    let app = test_app().await;
    let health = app.state.router.health_check().await;

    assert_eq!(health.overall_status, "healthy");
    assert_eq!(health.legacy_adapter_status, "healthy");
    assert_eq!(health.agent_coordinator_status, "healthy");
    assert_eq!(health.available_agents.len(), 3);
}

struct DeadLegacyAdapter;

#[async_trait::async_trait]
impl LegacyAdapter for DeadLegacyAdapter {
    async fn process_request(
        &self,
        _request_type: &str,
        _request_data: &Value,
        _user_id: i64,
        _board_id: Option<i64>,
    ) -> Result<Value> {
        Err(clip_ops::domain::ClipOpsError::internal("legacy is down"))
    }

    async fn ping(&self) -> Result<()> {
        Err(clip_ops::domain::ClipOpsError::internal("legacy is down"))
    }
}

#[tokio::test]
async fn router_degrades_and_fails_per_collaborator() {
    let app = test_app().await;

    // Healthy legacy, no registered agents: degraded
    let empty_coordinator = Arc::new(AgentCoordinator::new(AgentHarness::new(
        app.state.catalog.clone(),
        app.state.accountant.clone(),
    )));
    let mode_selector = Arc::new(ProcessingModeService::new(
        app.state.accountant.clone(),
        app.state.catalog.clone(),
    ));
    let degraded = SmartRouter::new(
        mode_selector.clone(),
        empty_coordinator.clone(),
        app.state.context_manager.clone(),
        Arc::new(SummarizationLegacyAdapter::new(app.state.summarization.clone())),
        app.state.accountant.clone(),
    );
    assert_eq!(degraded.health_check().await.overall_status, "degraded");

    // Both collaborators down: unhealthy
    let unhealthy = SmartRouter::new(
        mode_selector,
        empty_coordinator,
        app.state.context_manager.clone(),
        Arc::new(DeadLegacyAdapter),
        app.state.accountant.clone(),
    );
    assert_eq!(unhealthy.health_check().await.overall_status, "unhealthy");
}
