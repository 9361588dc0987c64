//! Model catalog service.
//!
//! Single source of truth for tier membership and fallback order. Agents
//! and pipelines reference tiers, never concrete models, so swapping or
//! re-ordering models is a catalog change only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{ClipOpsError, LlmTier, ModelEntry, Result};
use crate::storage::CatalogRepository;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CachedList {
    fetched_at: Instant,
    entries: Vec<ModelEntry>,
}

/// Repository-backed catalog with a bounded-TTL in-memory cache.
///
/// The cache is invalidated explicitly on every admin mutation, so a
/// running request never observes a half-applied catalog change.
pub struct ModelCatalogService {
    repository: Arc<dyn CatalogRepository>,
    cache_ttl: Duration,
    by_tier: RwLock<HashMap<LlmTier, CachedList>>,
    by_alias: RwLock<HashMap<String, (Instant, Option<ModelEntry>)>>,
}

impl ModelCatalogService {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self::with_ttl(repository, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(repository: Arc<dyn CatalogRepository>, cache_ttl: Duration) -> Self {
        Self {
            repository,
            cache_ttl,
            by_tier: RwLock::new(HashMap::new()),
            by_alias: RwLock::new(HashMap::new()),
        }
    }

    /// Active models of `tier` in fallback order.
    ///
    /// Errors with `NoModelsForTier` when the tier has no active entries;
    /// that is a configuration problem, not a runtime one.
    pub async fn get_models_by_tier(&self, tier: LlmTier) -> Result<Vec<ModelEntry>> {
        {
            let cache = self.by_tier.read().await;
            if let Some(cached) = cache.get(&tier) {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    debug!(%tier, "Catalog tier cache hit");
                    return non_empty(tier, cached.entries.clone());
                }
            }
        }

        let entries = self.repository.list_by_tier(tier).await?;
        let mut cache = self.by_tier.write().await;
        cache.insert(
            tier,
            CachedList {
                fetched_at: Instant::now(),
                entries: entries.clone(),
            },
        );
        non_empty(tier, entries)
    }

    pub async fn get_model_by_alias(&self, alias: &str) -> Result<Option<ModelEntry>> {
        {
            let cache = self.by_alias.read().await;
            if let Some((fetched_at, entry)) = cache.get(alias) {
                if fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.clone());
                }
            }
        }

        let entry = self.repository.get_by_alias(alias).await?;
        let mut cache = self.by_alias.write().await;
        cache.insert(alias.to_string(), (Instant::now(), entry.clone()));
        Ok(entry)
    }

    /// All active models across tiers, grouped by tier order.
    pub async fn get_active_models(&self) -> Result<Vec<ModelEntry>> {
        self.repository.list_active().await
    }

    /// Admin write path; invalidates the cache so readers see the change
    /// on their next call.
    pub async fn upsert_model(&self, entry: &ModelEntry) -> Result<()> {
        self.repository.upsert(entry).await?;
        self.invalidate().await;
        Ok(())
    }

    pub async fn set_active(&self, alias: &str, active: bool) -> Result<()> {
        self.repository.set_active(alias, active).await?;
        self.invalidate().await;
        Ok(())
    }

    pub async fn invalidate(&self) {
        self.by_tier.write().await.clear();
        self.by_alias.write().await.clear();
        info!("Model catalog cache invalidated");
    }
}

fn non_empty(tier: LlmTier, entries: Vec<ModelEntry>) -> Result<Vec<ModelEntry>> {
    if entries.is_empty() {
        return Err(ClipOpsError::NoModelsForTier(tier.as_str().to_string()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Provider;
    use crate::storage::{DatabasePool, SqliteCatalogRepository};

    async fn service_with_models() -> ModelCatalogService {
        let pool = DatabasePool::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteCatalogRepository::new(pool.pool().clone()));

        for (alias, order) in [("model-a", 0), ("model-b", 1), ("model-c", 2)] {
            repo.upsert(
                &ModelEntry::new(alias, Provider::OpenAI, alias, LlmTier::Light)
                    .with_sort_order(order),
            )
            .await
            .unwrap();
        }

        ModelCatalogService::new(repo)
    }

    #[tokio::test]
    async fn test_tier_ordering_is_stable() {
        let service = service_with_models().await;

        let first = service.get_models_by_tier(LlmTier::Light).await.unwrap();
        let second = service.get_models_by_tier(LlmTier::Light).await.unwrap();

        let aliases: Vec<_> = first.iter().map(|m| m.alias.clone()).collect();
        assert_eq!(aliases, vec!["model-a", "model-b", "model-c"]);
        assert_eq!(
            aliases,
            second.iter().map(|m| m.alias.clone()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_empty_tier_is_a_config_error() {
        let service = service_with_models().await;
        let err = service
            .get_models_by_tier(LlmTier::Premium)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipOpsError::NoModelsForTier(_)));
    }

    #[tokio::test]
    async fn test_admin_mutation_invalidates_cache() {
        let service = service_with_models().await;

        // Warm the cache, then deactivate the head of the tier
        service.get_models_by_tier(LlmTier::Light).await.unwrap();
        service.set_active("model-a", false).await.unwrap();

        let models = service.get_models_by_tier(LlmTier::Light).await.unwrap();
        assert_eq!(models[0].alias, "model-b");
    }

    #[tokio::test]
    async fn test_alias_lookup_miss_is_none() {
        let service = service_with_models().await;
        assert!(service.get_model_by_alias("ghost").await.unwrap().is_none());
    }
}
