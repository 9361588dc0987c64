// Row types for SQLite storage and their mapping into domain types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{
    CacheType, CallStatus, ClipOpsError, GlobalTagStat, LlmTier, ModelCallLog, ModelEntry,
    Provider, PurchaseStatus, PurchaseType, Result, SummaryCacheEntry, TagMasterEntry,
    TokenPurchase, UserTagStat, UserTokenQuota,
};

/// Timestamps are stored as text; accept both RFC 3339 and SQLite's
/// `datetime('now')` format.
pub(crate) fn parse_datetime(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_embedding(raw: Option<&str>) -> Option<Vec<f32>> {
    raw.and_then(|json| serde_json::from_str(json).ok())
}

#[derive(Debug, Clone, FromRow)]
pub struct ModelCatalogRow {
    pub alias: String,
    pub provider: String,
    pub model_name: String,
    pub tier: String,
    pub input_wtu_multiplier: String,
    pub output_wtu_multiplier: String,
    pub is_active: bool,
    pub price_input_per_million: Option<String>,
    pub price_output_per_million: Option<String>,
    pub sort_order: i64,
}

impl ModelCatalogRow {
    pub fn into_entry(self) -> Result<ModelEntry> {
        let tier = LlmTier::parse(&self.tier).ok_or_else(|| {
            ClipOpsError::validation(format!(
                "unknown tier '{}' for catalog alias '{}'",
                self.tier, self.alias
            ))
        })?;

        Ok(ModelEntry {
            alias: self.alias,
            provider: Provider::parse(&self.provider),
            model_name: self.model_name,
            tier,
            input_wtu_multiplier: Decimal::from_str(&self.input_wtu_multiplier)
                .unwrap_or(Decimal::ONE),
            output_wtu_multiplier: Decimal::from_str(&self.output_wtu_multiplier)
                .unwrap_or(Decimal::ONE),
            is_active: self.is_active,
            price_input_per_million: self
                .price_input_per_million
                .as_deref()
                .and_then(|p| Decimal::from_str(p).ok()),
            price_output_per_million: self
                .price_output_per_million
                .as_deref()
                .and_then(|p| Decimal::from_str(p).ok()),
            sort_order: self.sort_order,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ModelCallLogRow {
    pub model_alias: String,
    pub tier: String,
    pub status: String,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub fallback_to: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub response_time_ms: Option<i64>,
    pub created_at: String,
}

impl ModelCallLogRow {
    pub fn into_log(self) -> ModelCallLog {
        ModelCallLog {
            model_alias: self.model_alias,
            tier: self.tier,
            status: CallStatus::parse(&self.status).unwrap_or(CallStatus::Failed),
            error_type: self.error_type,
            error_message: self.error_message,
            fallback_to: self.fallback_to,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            response_time_ms: self.response_time_ms,
            created_at: parse_datetime(&self.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserTokenQuotaRow {
    pub user_id: i64,
    pub plan_month: String,
    pub allocated_quota: i64,
    pub used_tokens_wtu: i64,
    pub remaining_tokens: i64,
    pub total_purchased: i64,
}

impl UserTokenQuotaRow {
    pub fn into_quota(self) -> UserTokenQuota {
        UserTokenQuota {
            user_id: self.user_id,
            plan_month: parse_date(&self.plan_month),
            allocated_quota: self.allocated_quota,
            used_tokens_wtu: self.used_tokens_wtu,
            remaining_tokens: self.remaining_tokens,
            total_purchased: self.total_purchased,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TokenPurchaseRow {
    pub id: String,
    pub user_id: i64,
    pub plan_month: String,
    pub token_amount: i64,
    pub purchase_type: String,
    pub status: String,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub created_at: String,
}

impl TokenPurchaseRow {
    pub fn into_purchase(self) -> TokenPurchase {
        TokenPurchase {
            id: Uuid::from_str(&self.id).unwrap_or_else(|_| Uuid::new_v4()),
            user_id: self.user_id,
            plan_month: parse_date(&self.plan_month),
            token_amount: self.token_amount,
            purchase_type: PurchaseType::parse(&self.purchase_type)
                .unwrap_or(PurchaseType::Purchase),
            status: PurchaseStatus::parse(&self.status).unwrap_or(PurchaseStatus::Completed),
            currency: self.currency,
            transaction_id: self.transaction_id,
            created_at: parse_datetime(&self.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SummaryCacheRow {
    pub cache_key: String,
    pub cache_type: String,
    pub content_hash: String,
    pub extracted_text: String,
    pub summary: String,
    pub candidate_tags: String,
    pub candidate_categories: String,
    pub wtu_cost: i64,
    pub expires_at: String,
    pub created_at: String,
}

impl SummaryCacheRow {
    pub fn into_entry(self) -> SummaryCacheEntry {
        SummaryCacheEntry {
            cache_key: self.cache_key,
            cache_type: CacheType::parse(&self.cache_type).unwrap_or(CacheType::Webpage),
            content_hash: self.content_hash,
            extracted_text: self.extracted_text,
            summary: self.summary,
            candidate_tags: serde_json::from_str(&self.candidate_tags).unwrap_or_default(),
            candidate_categories: serde_json::from_str(&self.candidate_categories)
                .unwrap_or_default(),
            wtu_cost: self.wtu_cost,
            expires_at: parse_datetime(&self.expires_at),
            created_at: parse_datetime(&self.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TagMasterRow {
    pub id: i64,
    pub tag_name: String,
    pub embedding_vector: Option<String>,
    pub created_at: String,
}

impl TagMasterRow {
    pub fn into_entry(self) -> TagMasterEntry {
        TagMasterEntry {
            id: self.id,
            tag_name: self.tag_name,
            embedding_vector: parse_embedding(self.embedding_vector.as_deref()),
            created_at: parse_datetime(&self.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserTagStatRow {
    pub tag_name: String,
    pub embedding_vector: Option<String>,
    pub use_count: i64,
    pub last_used_at: Option<String>,
}

impl UserTagStatRow {
    pub fn into_stat(self) -> UserTagStat {
        UserTagStat {
            tag_name: self.tag_name,
            embedding_vector: parse_embedding(self.embedding_vector.as_deref()),
            use_count: self.use_count,
            last_used_at: self.last_used_at.as_deref().map(parse_datetime),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GlobalTagStatRow {
    pub tag_name: String,
    pub total_use_count: i64,
}

impl GlobalTagStatRow {
    pub fn into_stat(self) -> GlobalTagStat {
        GlobalTagStat {
            tag_name: self.tag_name,
            total_use_count: self.total_use_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("2026-03-01T12:00:00+00:00");
        assert_eq!(rfc.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        let sqlite = parse_datetime("2026-03-01 12:00:00");
        assert_eq!(sqlite, rfc);
    }

    #[test]
    fn test_catalog_row_rejects_unknown_tier() {
        let row = ModelCatalogRow {
            alias: "x".into(),
            provider: "openai".into(),
            model_name: "gpt".into(),
            tier: "mega".into(),
            input_wtu_multiplier: "1.0".into(),
            output_wtu_multiplier: "1.0".into(),
            is_active: true,
            price_input_per_million: None,
            price_output_per_million: None,
            sort_order: 0,
        };
        assert!(row.into_entry().is_err());
    }

    #[test]
    fn test_cache_row_parses_candidates() {
        let row = SummaryCacheRow {
            cache_key: "k".into(),
            cache_type: "webpage".into(),
            content_hash: "h".into(),
            extracted_text: "text".into(),
            summary: "s".into(),
            candidate_tags: r#"["python","django"]"#.into(),
            candidate_categories: r#"["Development"]"#.into(),
            wtu_cost: 3,
            expires_at: "2026-04-01T00:00:00+00:00".into(),
            created_at: "2026-03-01T00:00:00+00:00".into(),
        };
        let entry = row.into_entry();
        assert_eq!(entry.candidate_tags, vec!["python", "django"]);
        assert_eq!(entry.candidate_categories, vec!["Development"]);
    }
}
