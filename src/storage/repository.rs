use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Sqlite};
use tracing::info;

use super::models::{
    GlobalTagStatRow, ModelCallLogRow, ModelCatalogRow, SummaryCacheRow, TagMasterRow,
    TokenPurchaseRow, UserTagStatRow, UserTokenQuotaRow,
};
use crate::domain::{
    CacheType, ClipOpsError, GlobalTagStat, LlmTier, ModelCallLog, ModelEntry, Result,
    SummaryCacheEntry, TagMasterEntry, TokenPurchase, UserTagStat, UserTokenQuota,
};

fn month_key(month: NaiveDate) -> String {
    month.format("%Y-%m-%d").to_string()
}

#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active models of a tier in fallback order. The ordering is stable
    /// across calls within a deployment.
    async fn list_by_tier(&self, tier: LlmTier) -> Result<Vec<ModelEntry>>;
    async fn get_by_alias(&self, alias: &str) -> Result<Option<ModelEntry>>;
    async fn list_active(&self) -> Result<Vec<ModelEntry>>;
    async fn upsert(&self, entry: &ModelEntry) -> Result<()>;
    async fn set_active(&self, alias: &str, active: bool) -> Result<()>;
}

#[async_trait::async_trait]
pub trait CallLogRepository: Send + Sync {
    async fn record(&self, log: &ModelCallLog) -> Result<()>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<ModelCallLog>>;
}

#[async_trait::async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn get(&self, user_id: i64, plan_month: NaiveDate) -> Result<Option<UserTokenQuota>>;
    /// Full-row write; callers serialize per (user, month).
    async fn save(&self, quota: &UserTokenQuota) -> Result<()>;
    async fn append_purchase(&self, purchase: &TokenPurchase) -> Result<()>;
    async fn list_purchases(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
    ) -> Result<Vec<TokenPurchase>>;
    /// Per-model usage detail kept alongside the monthly accumulator.
    async fn record_usage_detail(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        model_alias: &str,
        board_id: Option<i64>,
        wtu: i64,
    ) -> Result<()>;
}

#[async_trait::async_trait]
pub trait SummaryCacheRepository: Send + Sync {
    /// Non-expired entry for the key/type pair, if any.
    async fn get(&self, cache_key: &str, cache_type: CacheType)
        -> Result<Option<SummaryCacheEntry>>;
    /// Replace-on-conflict upsert; last writer wins.
    async fn upsert(&self, entry: &SummaryCacheEntry) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait::async_trait]
pub trait TagRepository: Send + Sync {
    async fn get_or_create_tag(&self, tag_name: &str) -> Result<TagMasterEntry>;
    async fn set_embedding(&self, tag_name: &str, embedding: &[f32]) -> Result<()>;
    async fn upsert_user_usage(&self, user_id: i64, tag_id: i64, used_at: DateTime<Utc>)
        -> Result<()>;
    async fn user_tag_stats(&self, user_id: i64) -> Result<Vec<UserTagStat>>;
    async fn global_tag_stats(&self, limit: i64) -> Result<Vec<GlobalTagStat>>;
}

// ============================================================================
// SQLite implementations
// ============================================================================

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: Pool<Sqlite>,
}

impl SqliteCatalogRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn list_by_tier(&self, tier: LlmTier) -> Result<Vec<ModelEntry>> {
        let rows = sqlx::query_as::<_, ModelCatalogRow>(
            r#"
            SELECT alias, provider, model_name, tier, input_wtu_multiplier,
                   output_wtu_multiplier, is_active, price_input_per_million,
                   price_output_per_million, sort_order
            FROM model_catalog
            WHERE tier = ? AND is_active = 1
            ORDER BY sort_order, alias
            "#,
        )
        .bind(tier.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_entry()).collect()
    }

    async fn get_by_alias(&self, alias: &str) -> Result<Option<ModelEntry>> {
        let row = sqlx::query_as::<_, ModelCatalogRow>(
            r#"
            SELECT alias, provider, model_name, tier, input_wtu_multiplier,
                   output_wtu_multiplier, is_active, price_input_per_million,
                   price_output_per_million, sort_order
            FROM model_catalog
            WHERE alias = ?
            "#,
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_entry()).transpose()
    }

    async fn list_active(&self) -> Result<Vec<ModelEntry>> {
        let rows = sqlx::query_as::<_, ModelCatalogRow>(
            r#"
            SELECT alias, provider, model_name, tier, input_wtu_multiplier,
                   output_wtu_multiplier, is_active, price_input_per_million,
                   price_output_per_million, sort_order
            FROM model_catalog
            WHERE is_active = 1
            ORDER BY tier, sort_order, alias
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_entry()).collect()
    }

    async fn upsert(&self, entry: &ModelEntry) -> Result<()> {
        info!(alias = %entry.alias, tier = %entry.tier, "Upserting catalog entry");

        sqlx::query(
            r#"
            INSERT INTO model_catalog (
                alias, provider, model_name, tier, input_wtu_multiplier,
                output_wtu_multiplier, is_active, price_input_per_million,
                price_output_per_million, sort_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (alias) DO UPDATE SET
                provider = excluded.provider,
                model_name = excluded.model_name,
                tier = excluded.tier,
                input_wtu_multiplier = excluded.input_wtu_multiplier,
                output_wtu_multiplier = excluded.output_wtu_multiplier,
                is_active = excluded.is_active,
                price_input_per_million = excluded.price_input_per_million,
                price_output_per_million = excluded.price_output_per_million,
                sort_order = excluded.sort_order,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.alias)
        .bind(entry.provider.as_str())
        .bind(&entry.model_name)
        .bind(entry.tier.as_str())
        .bind(entry.input_wtu_multiplier.to_string())
        .bind(entry.output_wtu_multiplier.to_string())
        .bind(entry.is_active)
        .bind(entry.price_input_per_million.map(|p| p.to_string()))
        .bind(entry.price_output_per_million.map(|p| p.to_string()))
        .bind(entry.sort_order)
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_active(&self, alias: &str, active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE model_catalog SET is_active = ?, updated_at = ? WHERE alias = ?",
        )
        .bind(active)
        .bind(Utc::now().to_rfc3339())
        .bind(alias)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClipOpsError::validation(format!(
                "no catalog entry for alias '{}'",
                alias
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteCallLogRepository {
    pool: Pool<Sqlite>,
}

impl SqliteCallLogRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallLogRepository for SqliteCallLogRepository {
    async fn record(&self, log: &ModelCallLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO model_call_logs (
                model_alias, tier, status, error_type, error_message, fallback_to,
                input_tokens, output_tokens, response_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.model_alias)
        .bind(&log.tier)
        .bind(log.status.as_str())
        .bind(&log.error_type)
        .bind(&log.error_message)
        .bind(&log.fallback_to)
        .bind(log.input_tokens)
        .bind(log.output_tokens)
        .bind(log.response_time_ms)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ModelCallLog>> {
        let rows = sqlx::query_as::<_, ModelCallLogRow>(
            r#"
            SELECT model_alias, tier, status, error_type, error_message, fallback_to,
                   input_tokens, output_tokens, response_time_ms, created_at
            FROM model_call_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_log()).collect())
    }
}

#[derive(Clone)]
pub struct SqliteQuotaRepository {
    pool: Pool<Sqlite>,
}

impl SqliteQuotaRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn get(&self, user_id: i64, plan_month: NaiveDate) -> Result<Option<UserTokenQuota>> {
        let row = sqlx::query_as::<_, UserTokenQuotaRow>(
            r#"
            SELECT user_id, plan_month, allocated_quota, used_tokens_wtu,
                   remaining_tokens, total_purchased
            FROM user_token_quotas
            WHERE user_id = ? AND plan_month = ?
            "#,
        )
        .bind(user_id)
        .bind(month_key(plan_month))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_quota()))
    }

    async fn save(&self, quota: &UserTokenQuota) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_token_quotas (
                user_id, plan_month, allocated_quota, used_tokens_wtu,
                remaining_tokens, total_purchased
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, plan_month) DO UPDATE SET
                allocated_quota = excluded.allocated_quota,
                used_tokens_wtu = excluded.used_tokens_wtu,
                remaining_tokens = excluded.remaining_tokens,
                total_purchased = excluded.total_purchased
            "#,
        )
        .bind(quota.user_id)
        .bind(month_key(quota.plan_month))
        .bind(quota.allocated_quota)
        .bind(quota.used_tokens_wtu)
        .bind(quota.remaining_tokens)
        .bind(quota.total_purchased)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_purchase(&self, purchase: &TokenPurchase) -> Result<()> {
        purchase.validate()?;

        sqlx::query(
            r#"
            INSERT INTO token_purchases (
                id, user_id, plan_month, token_amount, purchase_type, status,
                currency, transaction_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(purchase.id.to_string())
        .bind(purchase.user_id)
        .bind(month_key(purchase.plan_month))
        .bind(purchase.token_amount)
        .bind(purchase.purchase_type.as_str())
        .bind(purchase.status.as_str())
        .bind(&purchase.currency)
        .bind(&purchase.transaction_id)
        .bind(purchase.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_purchases(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
    ) -> Result<Vec<TokenPurchase>> {
        let rows = sqlx::query_as::<_, TokenPurchaseRow>(
            r#"
            SELECT id, user_id, plan_month, token_amount, purchase_type, status,
                   currency, transaction_id, created_at
            FROM token_purchases
            WHERE user_id = ? AND plan_month = ?
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .bind(month_key(plan_month))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_purchase()).collect())
    }

    async fn record_usage_detail(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        model_alias: &str,
        board_id: Option<i64>,
        wtu: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO llm_usage_records (user_id, plan_month, model_alias, board_id, wtu, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(month_key(plan_month))
        .bind(model_alias)
        .bind(board_id)
        .bind(wtu)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteSummaryCacheRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSummaryCacheRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SummaryCacheRepository for SqliteSummaryCacheRepository {
    async fn get(
        &self,
        cache_key: &str,
        cache_type: CacheType,
    ) -> Result<Option<SummaryCacheEntry>> {
        let row = sqlx::query_as::<_, SummaryCacheRow>(
            r#"
            SELECT cache_key, cache_type, content_hash, extracted_text, summary,
                   candidate_tags, candidate_categories, wtu_cost, expires_at, created_at
            FROM summary_cache
            WHERE cache_key = ? AND cache_type = ? AND expires_at > ?
            "#,
        )
        .bind(cache_key)
        .bind(cache_type.as_str())
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_entry()))
    }

    async fn upsert(&self, entry: &SummaryCacheEntry) -> Result<()> {
        info!(
            cache_key = %entry.cache_key,
            cache_type = %entry.cache_type,
            wtu_cost = entry.wtu_cost,
            "Storing summary cache entry"
        );

        let tags_json = serde_json::to_string(&entry.candidate_tags)?;
        let categories_json = serde_json::to_string(&entry.candidate_categories)?;

        sqlx::query(
            r#"
            INSERT INTO summary_cache (
                cache_key, cache_type, content_hash, extracted_text, summary,
                candidate_tags, candidate_categories, wtu_cost, expires_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (cache_key, cache_type) DO UPDATE SET
                content_hash = excluded.content_hash,
                extracted_text = excluded.extracted_text,
                summary = excluded.summary,
                candidate_tags = excluded.candidate_tags,
                candidate_categories = excluded.candidate_categories,
                wtu_cost = excluded.wtu_cost,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at
            "#,
        )
        .bind(&entry.cache_key)
        .bind(entry.cache_type.as_str())
        .bind(&entry.content_hash)
        .bind(&entry.extracted_text)
        .bind(&entry.summary)
        .bind(tags_json)
        .bind(categories_json)
        .bind(entry.wtu_cost)
        .bind(entry.expires_at.to_rfc3339())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM summary_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "Purged expired summary cache entries");
        }
        Ok(purged)
    }
}

#[derive(Clone)]
pub struct SqliteTagRepository {
    pool: Pool<Sqlite>,
}

impl SqliteTagRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TagRepository for SqliteTagRepository {
    async fn get_or_create_tag(&self, tag_name: &str) -> Result<TagMasterEntry> {
        let normalized = crate::domain::normalize_tag(tag_name);

        sqlx::query(
            "INSERT INTO tag_master (tag_name, created_at) VALUES (?, ?)
             ON CONFLICT (tag_name) DO NOTHING",
        )
        .bind(&normalized)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, TagMasterRow>(
            "SELECT id, tag_name, embedding_vector, created_at FROM tag_master WHERE tag_name = ?",
        )
        .bind(&normalized)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_entry())
    }

    async fn set_embedding(&self, tag_name: &str, embedding: &[f32]) -> Result<()> {
        let normalized = crate::domain::normalize_tag(tag_name);
        let json = serde_json::to_string(embedding)?;

        sqlx::query("UPDATE tag_master SET embedding_vector = ? WHERE tag_name = ?")
            .bind(json)
            .bind(normalized)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_user_usage(
        &self,
        user_id: i64,
        tag_id: i64,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_tag_usage (user_id, tag_id, use_count, last_used_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (user_id, tag_id) DO UPDATE SET
                use_count = use_count + 1,
                last_used_at = excluded.last_used_at
            "#,
        )
        .bind(user_id)
        .bind(tag_id)
        .bind(used_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_tag_stats(&self, user_id: i64) -> Result<Vec<UserTagStat>> {
        let rows = sqlx::query_as::<_, UserTagStatRow>(
            r#"
            SELECT t.tag_name, t.embedding_vector, u.use_count, u.last_used_at
            FROM user_tag_usage u
            JOIN tag_master t ON t.id = u.tag_id
            WHERE u.user_id = ?
            ORDER BY u.use_count DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_stat()).collect())
    }

    async fn global_tag_stats(&self, limit: i64) -> Result<Vec<GlobalTagStat>> {
        let rows = sqlx::query_as::<_, GlobalTagStatRow>(
            r#"
            SELECT t.tag_name, SUM(u.use_count) AS total_use_count
            FROM user_tag_usage u
            JOIN tag_master t ON t.id = u.tag_id
            GROUP BY t.tag_name
            ORDER BY total_use_count DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_stat()).collect())
    }
}
