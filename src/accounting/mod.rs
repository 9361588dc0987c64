//! WTU computation and per-user monthly quota enforcement.

pub mod accountant;
pub mod wtu;

pub use accountant::{TryConsumeOutcome, WtuAccountant, DEFAULT_MONTHLY_QUOTA_WTU};
pub use wtu::{wtu_from_embedding_tokens, wtu_from_tokens};
