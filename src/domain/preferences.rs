use serde::{Deserialize, Serialize};

/// How the user weighs response quality against latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    Speed,
    #[default]
    Balanced,
    Quality,
}

/// How strongly cost should steer model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

/// Per-user model selection knobs, loaded once per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserModelPreferences {
    /// Catalog alias to use when set and active.
    #[serde(default)]
    pub default_llm_model: Option<String>,
    #[serde(default)]
    pub quality_preference: QualityPreference,
    #[serde(default)]
    pub cost_sensitivity: CostSensitivity,
    /// Restrict selection to these providers when non-empty.
    #[serde(default)]
    pub preferred_providers: Vec<String>,
    /// Aliases the user never wants.
    #[serde(default)]
    pub avoid_models: Vec<String>,
    /// Monthly WTU soft limit the mode selector compares against.
    #[serde(default)]
    pub budget_limit_wtu: Option<i64>,
}

impl UserModelPreferences {
    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn avoids(&self, alias: &str) -> bool {
        self.avoid_models.iter().any(|m| m == alias)
    }

    pub fn prefers_provider(&self, provider: &str) -> bool {
        self.preferred_providers.is_empty()
            || self.preferred_providers.iter().any(|p| p == provider)
    }
}
