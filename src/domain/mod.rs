//! Core domain types shared across the orchestration and accounting
//! subsystems.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod message;
pub mod preferences;
pub mod provider;
pub mod quota;
pub mod tags;

pub use cache::{CacheType, SummaryCacheEntry, DEFAULT_CACHE_TTL_DAYS};
pub use catalog::{LlmTier, ModelEntry};
pub use error::{ClipOpsError, Result};
pub use message::{CallStatus, LlmMessage, LlmResult, MessageRole, ModelCallLog};
pub use preferences::{CostSensitivity, QualityPreference, UserModelPreferences};
pub use provider::Provider;
pub use quota::{
    current_plan_month, plan_month_of, PurchaseStatus, PurchaseType, TokenPurchase, UserTokenQuota,
};
pub use tags::{normalize_tag, GlobalTagStat, TagMasterEntry, UserTagStat};
