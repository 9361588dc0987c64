//! Plan executor semantics: stage barriers, parallel fan-out, output
//! accumulation, usage, and the event stream.

mod helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clip_ops::domain::Result;
use clip_ops::orchestration::{
    AgentExecutionStatus, AgentResult, AgentSpec, ExecutionPlan, OrchestrationContext,
    PlanAgent, PlanAgentContext, PlanExecutor, Planner, PlanStage, RequestType, RetrievalMode,
};
use helpers::test_app;
use pretty_assertions::assert_eq;
use serde_json::json;

fn draft_plan(stages: Vec<PlanStage>) -> ExecutionPlan {
    ExecutionPlan {
        plan_id: "plan_test".to_string(),
        request_type: RequestType::Draft,
        retrieval_mode: RetrievalMode::Auto,
        stages,
        metadata: HashMap::new(),
    }
}

fn stage(index: i64, parallel: bool, agents: &[&str]) -> PlanStage {
    PlanStage {
        index,
        parallel,
        agents: agents.iter().map(|a| AgentSpec::new(*a)).collect(),
    }
}

fn context() -> OrchestrationContext {
    OrchestrationContext::new("req-1", 1).with_prompt("write about rust")
}

/// Captures the previous_outputs each run observed.
struct ProbeAgent {
    name: String,
    seen: Arc<Mutex<Vec<Vec<String>>>>,
    output_key: String,
    model: String,
}

#[async_trait::async_trait]
impl PlanAgent for ProbeAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &PlanAgentContext) -> Result<AgentResult> {
        let mut keys: Vec<String> = context.previous_outputs().keys().cloned().collect();
        keys.sort();
        self.seen.lock().unwrap().push(keys);

        let mut output = HashMap::new();
        output.insert(self.output_key.clone(), json!(format!("{} output", self.name)));
        Ok(AgentResult::completed(&self.name, format!("{} content", self.name))
            .with_output(output)
            .with_usage(&self.model, 1200, 300))
    }
}

fn probe(name: &str, seen: &Arc<Mutex<Vec<Vec<String>>>>, output_key: &str) -> Arc<ProbeAgent> {
    Arc::new(ProbeAgent {
        name: name.to_string(),
        seen: seen.clone(),
        output_key: output_key.to_string(),
        model: "light-a".to_string(),
    })
}

#[tokio::test]
async fn parallel_stage_outputs_reach_the_writer() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    executor.register_agent(probe("x", &seen, "x_data"));
    executor.register_agent(probe("y", &seen, "y_data"));
    executor.register_agent(probe("writer", &seen, "draft_md"));

    let plan = draft_plan(vec![
        stage(1, true, &["x", "y"]),
        stage(2, false, &["writer"]),
    ]);

    let result = executor.execute(&plan, &context(), None).await.unwrap();

    // The writer saw both first-stage outputs
    let observed = seen.lock().unwrap();
    let writer_view = observed.last().unwrap();
    assert_eq!(writer_view, &vec!["x".to_string(), "y".to_string()]);

    // final_output is the writer's output
    assert_eq!(
        result.final_output.get("draft_md").unwrap(),
        &json!("writer output")
    );

    // usage covers all three agents: 1200+300 baseline tokens -> 2 WTU each
    assert_eq!(result.usage.total_wtu, 6);
    assert_eq!(result.usage.agents.len(), 3);
    assert!(result.usage.agents.values().all(|u| u.wtu == 2));
}

#[tokio::test]
async fn unregistered_agent_is_skipped_and_execution_proceeds() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    executor.register_agent(probe("writer", &seen, "draft_md"));

    let plan = draft_plan(vec![
        stage(1, false, &["ghost"]),
        stage(2, false, &["writer"]),
    ]);

    let result = executor.execute(&plan, &context(), None).await.unwrap();

    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].status, AgentExecutionStatus::Skipped);
    assert!(result.results[0].skipped);
    assert_eq!(result.warnings, vec!["Agent not registered"]);
    // Skipped agents contribute no usage
    assert!(!result.usage.agents.contains_key("ghost"));
    assert!(result.final_output.contains_key("draft_md"));
}

#[tokio::test]
async fn plan_without_writer_yields_empty_final_output() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    executor.register_agent(probe("summarizer", &seen, "summary"));

    let plan = draft_plan(vec![stage(1, false, &["summarizer"])]);
    let result = executor.execute(&plan, &context(), None).await.unwrap();

    assert!(result.final_output.is_empty());
    assert_eq!(result.usage.total_wtu, 2);
}

struct FailingAgent;

#[async_trait::async_trait]
impl PlanAgent for FailingAgent {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(&self, _context: &PlanAgentContext) -> Result<AgentResult> {
        Err(clip_ops::domain::ClipOpsError::internal("agent blew up"))
    }
}

#[tokio::test]
async fn failing_agent_is_recorded_and_later_stages_still_run() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    executor.register_agent(Arc::new(FailingAgent));
    executor.register_agent(probe("writer", &seen, "draft_md"));

    let plan = draft_plan(vec![
        stage(1, false, &["flaky"]),
        stage(2, false, &["writer"]),
    ]);

    let result = executor.execute(&plan, &context(), None).await.unwrap();

    assert_eq!(result.results[0].status, AgentExecutionStatus::Failed);
    assert!(result.results[0].error.as_deref().unwrap().contains("agent blew up"));
    // Failed agents contribute no usage but don't stop the plan
    assert!(!result.usage.agents.contains_key("flaky"));
    assert!(result.final_output.contains_key("draft_md"));
}

#[tokio::test]
async fn event_stream_reports_plan_stages_and_agents() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    executor.register_agent(probe("summarizer", &seen, "summary"));
    executor.register_agent(probe("writer", &seen, "draft_md"));

    let plan = Planner::build_plan("req-1", RequestType::Draft, RetrievalMode::Auto);

    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    executor.execute(&plan, &context(), Some(tx)).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "plan",
            "status",
            "agent_start",
            "agent_done",
            "status",
            "agent_start",
            "agent_done",
        ]
    );

    assert_eq!(events[0].data["plan_id"], json!("plan_req-1"));
    assert_eq!(events[1].data["stage"], json!(1));
    assert_eq!(events[6].data["success"], json!(true));
}

#[tokio::test]
async fn usage_applies_catalog_multipliers() {
    let app = test_app().await;
    let executor = PlanExecutor::new(app.state.accountant.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    // std-a carries 3.0x multipliers in the fixture catalog
    let agent = Arc::new(ProbeAgent {
        name: "writer".to_string(),
        seen: seen.clone(),
        output_key: "draft_md".to_string(),
        model: "std-a".to_string(),
    });
    executor.register_agent(agent);

    let plan = draft_plan(vec![stage(1, false, &["writer"])]);
    let result = executor.execute(&plan, &context(), None).await.unwrap();

    // ceil(1.2 * 3.0 + 0.3 * 3.0) = 5
    assert_eq!(result.usage.agents["writer"].wtu, 5);
    assert_eq!(result.usage.total_wtu, 5);
}
