use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ClipOpsError, Result};

/// Normalize an arbitrary date to the first day of its month, the key the
/// accountant aggregates on.
pub fn plan_month_of(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is always valid")
}

/// Current plan month in UTC.
pub fn current_plan_month() -> NaiveDate {
    plan_month_of(Utc::now().date_naive())
}

/// Per-user monthly WTU accumulator. All mutation goes through the
/// accountant; `remaining_tokens` is always `allocated_quota - used_tokens_wtu`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokenQuota {
    pub user_id: i64,
    pub plan_month: NaiveDate,
    pub allocated_quota: i64,
    pub used_tokens_wtu: i64,
    pub remaining_tokens: i64,
    pub total_purchased: i64,
}

impl UserTokenQuota {
    pub fn new(user_id: i64, plan_month: NaiveDate, allocated_quota: i64) -> Self {
        Self {
            user_id,
            plan_month: plan_month_of(plan_month),
            allocated_quota,
            used_tokens_wtu: 0,
            remaining_tokens: allocated_quota,
            total_purchased: 0,
        }
    }

    pub fn usage_ratio(&self) -> f64 {
        if self.allocated_quota == 0 {
            return 0.0;
        }
        self.used_tokens_wtu as f64 / self.allocated_quota as f64
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_tokens <= 0
    }

    pub fn can_consume(&self, wtu: i64) -> bool {
        self.remaining_tokens >= wtu
    }

    /// Deduct `wtu` if the full amount fits; no partial consumption.
    pub fn consume(&mut self, wtu: i64) -> bool {
        if !self.can_consume(wtu) {
            return false;
        }
        self.used_tokens_wtu += wtu;
        self.remaining_tokens = (self.allocated_quota - self.used_tokens_wtu).max(0);
        true
    }

    pub fn add_quota(&mut self, amount: i64) {
        self.allocated_quota += amount;
        self.total_purchased += amount;
        self.remaining_tokens = self.allocated_quota - self.used_tokens_wtu;
    }

    pub fn validate(&self) -> Result<()> {
        if self.remaining_tokens != self.allocated_quota - self.used_tokens_wtu {
            return Err(ClipOpsError::validation(format!(
                "quota invariant broken for user {}: remaining={} allocated={} used={}",
                self.user_id, self.remaining_tokens, self.allocated_quota, self.used_tokens_wtu
            )));
        }
        if self.remaining_tokens < 0 || self.used_tokens_wtu < 0 || self.allocated_quota < 0 {
            return Err(ClipOpsError::validation(format!(
                "negative quota fields for user {}",
                self.user_id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseType {
    Purchase,
    Bonus,
    Refund,
}

impl PurchaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseType::Purchase => "purchase",
            PurchaseType::Bonus => "bonus",
            PurchaseType::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(PurchaseType::Purchase),
            "bonus" => Some(PurchaseType::Bonus),
            "refund" => Some(PurchaseType::Refund),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseStatus::Pending),
            "completed" => Some(PurchaseStatus::Completed),
            "failed" => Some(PurchaseStatus::Failed),
            "refunded" => Some(PurchaseStatus::Refunded),
            _ => None,
        }
    }
}

/// Append-only audit record for quota additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPurchase {
    pub id: Uuid,
    pub user_id: i64,
    pub plan_month: NaiveDate,
    pub token_amount: i64,
    pub purchase_type: PurchaseType,
    pub status: PurchaseStatus,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TokenPurchase {
    pub fn new(
        user_id: i64,
        plan_month: NaiveDate,
        token_amount: i64,
        purchase_type: PurchaseType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan_month: plan_month_of(plan_month),
            token_amount,
            purchase_type,
            status: PurchaseStatus::Completed,
            currency: "USD".to_string(),
            transaction_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_amount <= 0 {
            return Err(ClipOpsError::validation(
                "purchase token_amount must be positive",
            ));
        }
        Ok(())
    }
}
