//! Declarative multi-stage agent orchestration: plan types, the default
//! planner, plan agents, and the executor with its SSE event stream.

pub mod agents;
pub mod executor;
pub mod models;
pub mod planner;

pub use agents::{PlanAgent, ResearcherAgent, SummarizerAgent, WriterAgent};
pub use executor::PlanExecutor;
pub use models::{
    AgentExecutionStatus, AgentResult, AgentSpec, AgentUsage, EventSender, ExecutionPlan,
    ExecutionResult, OrchestrationContext, PlanAgentContext, PlanStage, RequestType,
    RetrievalMode, StreamEvent, UsageSummary,
};
pub use planner::Planner;
