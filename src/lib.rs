//! Clip-Ops - LLM orchestration and accounting core
//!
//! This library coordinates the language-model work behind a web
//! content ingestion service: a tiered gateway with provider fallback,
//! multi-agent orchestration, per-user WTU budget accounting, and a
//! content-addressed summary cache with per-user personalization.

pub mod accounting;
pub mod agents;
pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod extract;
pub mod gateway;
pub mod observability;
pub mod orchestration;
pub mod personalization;
pub mod routing;
pub mod storage;
pub mod summarize;
pub mod testing;
pub mod tiered;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use domain::{
    CacheType, ClipOpsError, LlmMessage, LlmResult, LlmTier, ModelEntry, Provider, Result,
    SummaryCacheEntry, UserModelPreferences, UserTokenQuota,
};

pub use accounting::{wtu_from_tokens, WtuAccountant};
pub use catalog::ModelCatalogService;
pub use gateway::{CompletionOptions, HttpLlmGateway, LlmGateway};
pub use tiered::TieredClient;

pub use cache::SummaryCache;
pub use personalization::PersonalizationService;
pub use summarize::{SummarizationService, SummarizeOutcome, SummarizeSource};

pub use agents::{AgentContextManager, AgentCoordinator, AgentHarness};
pub use orchestration::{ExecutionPlan, ExecutionResult, PlanExecutor, Planner};
pub use routing::{ProcessingModeService, SmartRouter};

pub use api::{create_router, AppState};
pub use config::Config;
pub use storage::{DatabaseConfig, DatabasePool};
