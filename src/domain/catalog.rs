use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::provider::Provider;

/// Capability tier callers use in place of model names.
///
/// Fallback order within a tier comes from the catalog, so adding or
/// re-ordering models is a configuration change only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmTier {
    /// Simple work: summaries, classification.
    Light,
    /// General work: comparisons, writing.
    Standard,
    /// Heavy reasoning.
    Premium,
    /// Web-search-backed completion.
    Search,
    /// Embedding generation.
    Embedding,
}

impl LlmTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmTier::Light => "light",
            LlmTier::Standard => "standard",
            LlmTier::Premium => "premium",
            LlmTier::Search => "search",
            LlmTier::Embedding => "embedding",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(LlmTier::Light),
            "standard" => Some(LlmTier::Standard),
            "premium" => Some(LlmTier::Premium),
            "search" => Some(LlmTier::Search),
            "embedding" => Some(LlmTier::Embedding),
            _ => None,
        }
    }
}

impl std::fmt::Display for LlmTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the model catalog: the single source of truth for which
/// concrete model serves a tier, its WTU weights and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique alias used by callers (e.g. "claude-4.5-haiku").
    pub alias: String,
    pub provider: Provider,
    /// Provider-specific model identifier.
    pub model_name: String,
    pub tier: LlmTier,
    pub input_wtu_multiplier: Decimal,
    pub output_wtu_multiplier: Decimal,
    pub is_active: bool,
    pub price_input_per_million: Option<Decimal>,
    pub price_output_per_million: Option<Decimal>,
    /// Defines iteration (fallback) order within a tier; ties break on alias.
    pub sort_order: i64,
}

impl ModelEntry {
    pub fn new(
        alias: impl Into<String>,
        provider: Provider,
        model_name: impl Into<String>,
        tier: LlmTier,
    ) -> Self {
        Self {
            alias: alias.into(),
            provider,
            model_name: model_name.into(),
            tier,
            input_wtu_multiplier: Decimal::ONE,
            output_wtu_multiplier: Decimal::ONE,
            is_active: true,
            price_input_per_million: None,
            price_output_per_million: None,
            sort_order: 0,
        }
    }

    pub fn with_multipliers(mut self, input: Decimal, output: Decimal) -> Self {
        self.input_wtu_multiplier = input;
        self.output_wtu_multiplier = output;
        self
    }

    pub fn with_pricing(mut self, input: Decimal, output: Decimal) -> Self {
        self.price_input_per_million = Some(input);
        self.price_output_per_million = Some(output);
        self
    }

    pub fn with_sort_order(mut self, order: i64) -> Self {
        self.sort_order = order;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Combined multiplier weight, used to pick the cheapest model for
    /// cost-sensitive users.
    pub fn multiplier_weight(&self) -> Decimal {
        self.input_wtu_multiplier + self.output_wtu_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_roundtrip() {
        for tier in [
            LlmTier::Light,
            LlmTier::Standard,
            LlmTier::Premium,
            LlmTier::Search,
            LlmTier::Embedding,
        ] {
            assert_eq!(LlmTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(LlmTier::parse("ultra"), None);
    }

    #[test]
    fn test_builder_defaults() {
        let entry = ModelEntry::new("haiku", Provider::Anthropic, "claude-haiku", LlmTier::Light);
        assert!(entry.is_active);
        assert_eq!(entry.input_wtu_multiplier, Decimal::ONE);
        assert_eq!(entry.multiplier_weight(), dec!(2.0));
    }
}
