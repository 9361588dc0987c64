//! Agent execution: per-session contexts, the agent contract with its
//! WTU-tracked harness, the coordinator, and the built-in agents.

pub mod base;
pub mod context;
pub mod coordinator;
pub mod specialized;

pub use base::{AgentHarness, AgentResponse, AgentTaskOutput, AiAgent, TokensUsed};
pub use context::{
    AgentContext, AgentContextManager, ContextMetrics, ContextOptions,
    DEFAULT_CONTEXT_MAX_AGE_HOURS,
};
pub use coordinator::{AgentCoordinator, CoordinatedResponse};
pub use specialized::{ContentAnalysisAgent, SummaryGenerationAgent, ValidatorAgent};
