use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::wtu::wtu_from_tokens;
use crate::catalog::ModelCatalogService;
use crate::domain::{
    plan_month_of, ClipOpsError, PurchaseType, Result, TokenPurchase, UserTokenQuota,
};
use crate::storage::QuotaRepository;

pub const DEFAULT_MONTHLY_QUOTA_WTU: i64 = 10_000;

/// Outcome of an atomic check-and-deduct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryConsumeOutcome {
    pub ok: bool,
    pub remaining: i64,
}

/// Owner of all `user_token_quotas` writes.
///
/// Operations on the same (user, month) key are linearized through a
/// per-key async mutex, so a concurrent `try_consume` and `add_quota`
/// always land in some serial order.
pub struct WtuAccountant {
    repository: Arc<dyn QuotaRepository>,
    catalog: Arc<ModelCatalogService>,
    default_monthly_quota: i64,
    key_locks: Mutex<HashMap<(i64, NaiveDate), Arc<tokio::sync::Mutex<()>>>>,
}

impl WtuAccountant {
    pub fn new(repository: Arc<dyn QuotaRepository>, catalog: Arc<ModelCatalogService>) -> Self {
        Self::with_default_quota(repository, catalog, DEFAULT_MONTHLY_QUOTA_WTU)
    }

    pub fn with_default_quota(
        repository: Arc<dyn QuotaRepository>,
        catalog: Arc<ModelCatalogService>,
        default_monthly_quota: i64,
    ) -> Self {
        Self {
            repository,
            catalog,
            default_monthly_quota,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, user_id: i64, plan_month: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().expect("key lock map poisoned");
        locks
            .entry((user_id, plan_month))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load_or_default(&self, user_id: i64, plan_month: NaiveDate) -> Result<UserTokenQuota> {
        Ok(self
            .repository
            .get(user_id, plan_month)
            .await?
            .unwrap_or_else(|| {
                UserTokenQuota::new(user_id, plan_month, self.default_monthly_quota)
            }))
    }

    /// Convert token counts into WTU using catalog multipliers.
    ///
    /// An alias missing from the catalog falls back to the baseline
    /// (1.0, 1.0) weights rather than failing the request.
    pub async fn compute_wtu(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        model_alias: &str,
    ) -> Result<i64> {
        let (input_mult, output_mult) = match self.catalog.get_model_by_alias(model_alias).await? {
            Some(entry) => (entry.input_wtu_multiplier, entry.output_wtu_multiplier),
            None => {
                warn!(model_alias, "Model not in catalog, using baseline 1.0x weights");
                (Decimal::ONE, Decimal::ONE)
            }
        };

        Ok(wtu_from_tokens(
            input_tokens,
            output_tokens,
            input_mult,
            output_mult,
        ))
    }

    /// Record consumed WTU after an LLM call completed.
    ///
    /// Creates the month row on first use. Remaining is clamped at zero;
    /// admission control keeps usage within budget, this records reality.
    pub async fn record_usage(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        wtu: i64,
        model_alias: &str,
        board_id: Option<i64>,
    ) -> Result<UserTokenQuota> {
        let plan_month = plan_month_of(plan_month);
        let lock = self.lock_for(user_id, plan_month);
        let _guard = lock.lock().await;

        let mut quota = self.load_or_default(user_id, plan_month).await?;
        quota.used_tokens_wtu += wtu;
        quota.remaining_tokens = (quota.allocated_quota - quota.used_tokens_wtu).max(0);
        self.repository.save(&quota).await?;
        self.repository
            .record_usage_detail(user_id, plan_month, model_alias, board_id, wtu)
            .await?;

        metrics::counter!("clipops_wtu_consumed_total", wtu as u64);
        info!(user_id, model_alias, wtu, remaining = quota.remaining_tokens, "Recorded WTU usage");

        Ok(quota)
    }

    /// Pure read: would `estimated_wtu` fit the user's remaining budget?
    pub async fn can_consume(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        estimated_wtu: i64,
    ) -> Result<bool> {
        let quota = self
            .load_or_default(user_id, plan_month_of(plan_month))
            .await?;
        Ok(quota.can_consume(estimated_wtu))
    }

    /// Atomic check-and-deduct. On insufficient budget, returns
    /// `ok = false` with no side effect; never a partial deduction.
    pub async fn try_consume(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        estimated_wtu: i64,
    ) -> Result<TryConsumeOutcome> {
        let plan_month = plan_month_of(plan_month);
        let lock = self.lock_for(user_id, plan_month);
        let _guard = lock.lock().await;

        let mut quota = self.load_or_default(user_id, plan_month).await?;
        if !quota.consume(estimated_wtu) {
            return Ok(TryConsumeOutcome {
                ok: false,
                remaining: quota.remaining_tokens,
            });
        }

        self.repository.save(&quota).await?;
        Ok(TryConsumeOutcome {
            ok: true,
            remaining: quota.remaining_tokens,
        })
    }

    /// Admission gate used before any LLM work starts.
    pub async fn ensure_can_consume(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        estimated_wtu: i64,
    ) -> Result<()> {
        let quota = self
            .load_or_default(user_id, plan_month_of(plan_month))
            .await?;
        if !quota.can_consume(estimated_wtu) {
            metrics::increment_counter!("clipops_quota_rejections_total");
            return Err(ClipOpsError::QuotaExceeded {
                needed: estimated_wtu,
                remaining: quota.remaining_tokens,
            });
        }
        Ok(())
    }

    /// Grant quota (purchase, bonus or refund) and append the audit row.
    pub async fn add_quota(
        &self,
        user_id: i64,
        plan_month: NaiveDate,
        amount: i64,
        source: PurchaseType,
    ) -> Result<UserTokenQuota> {
        if amount <= 0 {
            return Err(ClipOpsError::validation("quota amount must be positive"));
        }

        let plan_month = plan_month_of(plan_month);
        let lock = self.lock_for(user_id, plan_month);
        let _guard = lock.lock().await;

        let mut quota = self.load_or_default(user_id, plan_month).await?;
        quota.add_quota(amount);
        self.repository.save(&quota).await?;
        self.repository
            .append_purchase(&TokenPurchase::new(user_id, plan_month, amount, source))
            .await?;

        info!(user_id, amount, source = source.as_str(), "Added quota");
        Ok(quota)
    }

    /// Month-to-date consumed WTU; zero when the user has no row yet.
    pub async fn monthly_usage(&self, user_id: i64, plan_month: NaiveDate) -> Result<i64> {
        Ok(self
            .repository
            .get(user_id, plan_month_of(plan_month))
            .await?
            .map(|q| q.used_tokens_wtu)
            .unwrap_or(0))
    }

    /// Seed or overwrite a user's month row. Administrative.
    pub async fn set_quota(&self, quota: &UserTokenQuota) -> Result<()> {
        quota.validate()?;
        let lock = self.lock_for(quota.user_id, quota.plan_month);
        let _guard = lock.lock().await;
        self.repository.save(quota).await
    }
}
