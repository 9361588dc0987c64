//! Shared fixtures for the integration suites.

use std::sync::Arc;

use clip_ops::api::AppState;
use clip_ops::domain::{LlmTier, ModelEntry, Provider};
use clip_ops::gateway::LlmGateway;
use clip_ops::storage::DatabasePool;
use clip_ops::testing::ScriptedGateway;
use rust_decimal::Decimal;

pub struct TestApp {
    pub state: Arc<AppState>,
    pub gateway: Arc<ScriptedGateway>,
}

/// Fully wired app over an in-memory database and a scripted gateway,
/// with a seeded multi-tier catalog:
/// light `light-a` -> `light-b` -> `light-c`, one model each for the
/// standard, premium, search and embedding tiers.
pub async fn app_with_gateway(gateway: ScriptedGateway) -> TestApp {
    let pool = DatabasePool::new_in_memory().await.unwrap();
    let gateway = Arc::new(gateway);
    let state = AppState::build(pool, gateway.clone() as Arc<dyn LlmGateway>, 10_000);

    for (alias, order) in [("light-a", 0), ("light-b", 1), ("light-c", 2)] {
        state
            .catalog
            .upsert_model(
                &ModelEntry::new(alias, Provider::OpenAI, alias, LlmTier::Light)
                    .with_sort_order(order),
            )
            .await
            .unwrap();
    }
    state
        .catalog
        .upsert_model(
            &ModelEntry::new("std-a", Provider::Anthropic, "std-a", LlmTier::Standard)
                .with_multipliers(Decimal::from(3), Decimal::from(3)),
        )
        .await
        .unwrap();
    state
        .catalog
        .upsert_model(&ModelEntry::new(
            "prem-a",
            Provider::Anthropic,
            "prem-a",
            LlmTier::Premium,
        ))
        .await
        .unwrap();
    state
        .catalog
        .upsert_model(&ModelEntry::new(
            "search-a",
            Provider::Perplexity,
            "search-a",
            LlmTier::Search,
        ))
        .await
        .unwrap();
    state
        .catalog
        .upsert_model(&ModelEntry::new(
            "embed-a",
            Provider::OpenAI,
            "embed-a",
            LlmTier::Embedding,
        ))
        .await
        .unwrap();

    TestApp { state, gateway }
}

pub async fn test_app() -> TestApp {
    app_with_gateway(ScriptedGateway::new()).await
}

/// Queue the three summarization pipeline responses in call order.
pub fn queue_pipeline(gateway: &ScriptedGateway, summary: &str, tags_json: &str, categories_json: &str) {
    gateway.queue_response(summary);
    gateway.queue_response(tags_json);
    gateway.queue_response(categories_json);
}
