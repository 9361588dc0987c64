//! HTTP surface: a thin axum layer over the orchestration core.

pub mod error;
pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::accounting::WtuAccountant;
use crate::agents::{
    AgentContextManager, AgentCoordinator, AgentHarness, ContentAnalysisAgent,
    SummaryGenerationAgent, ValidatorAgent,
};
use crate::catalog::ModelCatalogService;
use crate::cache::SummaryCache;
use crate::config::Config;
use crate::domain::Result;
use crate::extract::PassthroughExtractor;
use crate::gateway::{HttpLlmGateway, LlmGateway};
use crate::orchestration::{PlanExecutor, ResearcherAgent, SummarizerAgent, WriterAgent};
use crate::personalization::PersonalizationService;
use crate::routing::{ProcessingModeService, SmartRouter, SummarizationLegacyAdapter};
use crate::storage::{
    DatabasePool, SqliteCallLogRepository, SqliteCatalogRepository, SqliteQuotaRepository,
    SqliteSummaryCacheRepository, SqliteTagRepository,
};
use crate::summarize::SummarizationService;
use crate::tiered::TieredClient;

pub use error::{ApiError, ApiResult};

/// Fully wired service graph behind the HTTP handlers.
pub struct AppState {
    pub pool: DatabasePool,
    pub catalog: Arc<ModelCatalogService>,
    pub accountant: Arc<WtuAccountant>,
    pub tiered: Arc<TieredClient>,
    pub personalization: Arc<PersonalizationService>,
    pub summarization: Arc<SummarizationService>,
    pub mode_selector: Arc<ProcessingModeService>,
    pub coordinator: Arc<AgentCoordinator>,
    pub context_manager: Arc<AgentContextManager>,
    pub plan_executor: Arc<PlanExecutor>,
    pub router: Arc<SmartRouter>,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Arc<Self>> {
        let pool = DatabasePool::new(&config.database).await?;
        let gateway: Arc<dyn LlmGateway> =
            Arc::new(HttpLlmGateway::new(config.providers.endpoints())?);
        Ok(Self::build(pool, gateway, config.quota.default_monthly_wtu))
    }

    /// Assemble the service graph on an existing pool and gateway.
    /// Tests inject a scripted gateway here.
    pub fn build(
        pool: DatabasePool,
        gateway: Arc<dyn LlmGateway>,
        default_monthly_wtu: i64,
    ) -> Arc<Self> {
        let db = pool.pool().clone();

        let catalog = Arc::new(ModelCatalogService::new(Arc::new(
            SqliteCatalogRepository::new(db.clone()),
        )));
        let accountant = Arc::new(WtuAccountant::with_default_quota(
            Arc::new(SqliteQuotaRepository::new(db.clone())),
            Arc::clone(&catalog),
            default_monthly_wtu,
        ));
        let tiered = Arc::new(TieredClient::new(
            Arc::clone(&catalog),
            Arc::clone(&gateway),
            Arc::new(SqliteCallLogRepository::new(db.clone())),
        ));
        let personalization = Arc::new(PersonalizationService::new(
            Arc::new(SqliteTagRepository::new(db.clone())),
            Arc::clone(&tiered),
        ));
        let summarization = Arc::new(SummarizationService::new(
            Arc::clone(&tiered),
            SummaryCache::new(Arc::new(SqliteSummaryCacheRepository::new(db))),
            Arc::new(PassthroughExtractor),
            Arc::clone(&personalization),
            Arc::clone(&accountant),
        ));

        let context_manager = Arc::new(AgentContextManager::new());
        let coordinator = Arc::new(AgentCoordinator::new(AgentHarness::new(
            Arc::clone(&catalog),
            Arc::clone(&accountant),
        )));
        coordinator.register_agent(Arc::new(ContentAnalysisAgent::new(
            Arc::clone(&catalog),
            Arc::clone(&gateway),
        )));
        coordinator.register_agent(Arc::new(SummaryGenerationAgent::new(
            Arc::clone(&catalog),
            Arc::clone(&gateway),
        )));
        coordinator.register_agent(Arc::new(ValidatorAgent::new(
            Arc::clone(&catalog),
            Arc::clone(&gateway),
        )));

        let plan_executor = Arc::new(PlanExecutor::new(Arc::clone(&accountant)));
        plan_executor.register_agent(Arc::new(SummarizerAgent::new(Arc::clone(&tiered))));
        plan_executor.register_agent(Arc::new(ResearcherAgent::new(Arc::clone(&tiered))));
        plan_executor.register_agent(Arc::new(WriterAgent::new(Arc::clone(&tiered))));

        let mode_selector = Arc::new(ProcessingModeService::new(
            Arc::clone(&accountant),
            Arc::clone(&catalog),
        ));
        let router = Arc::new(SmartRouter::new(
            Arc::clone(&mode_selector),
            Arc::clone(&coordinator),
            Arc::clone(&context_manager),
            Arc::new(SummarizationLegacyAdapter::new(Arc::clone(&summarization))),
            Arc::clone(&accountant),
        ));

        Arc::new(AppState {
            pool,
            catalog,
            accountant,
            tiered,
            personalization,
            summarization,
            mode_selector,
            coordinator,
            context_manager,
            plan_executor,
            router,
        })
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(handlers::health_check))
        .route("/v2/monitoring/system-status", get(handlers::system_status))
        .route("/v2/monitoring/routing-stats", get(handlers::routing_stats))
        // Clipper summarization
        .route("/v1/clipper/webpage/summarize", post(handlers::summarize_webpage))
        .route("/v1/clipper/youtube/summarize", post(handlers::summarize_youtube))
        .route("/v1/clipper/pdf/summarize", post(handlers::summarize_pdf))
        .route("/v1/clipper/confirm", post(handlers::confirm_selection))
        // Mode selection and routed execution
        .route("/v2/mode/select", post(handlers::select_mode))
        .route("/v2/ai/smart-routing", post(handlers::smart_routing))
        .route("/v2/ai/plan/stream", post(handlers::plan_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
