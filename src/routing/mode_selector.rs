//! Scores the legacy single-shot path against the multi-agent path and
//! recommends one. Scoring failures never propagate: the selector falls
//! back to a legacy recommendation with the failure as its reason.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::accounting::WtuAccountant;
use crate::catalog::ModelCatalogService;
use crate::domain::{
    current_plan_month, CostSensitivity, LlmTier, QualityPreference, Result,
    UserModelPreferences,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    #[default]
    Auto,
    Legacy,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectedMode {
    #[default]
    Legacy,
    Agent,
}

impl SelectedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectedMode::Legacy => "legacy",
            SelectedMode::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityPreference {
    Fast,
    #[default]
    Balanced,
    Thorough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingModeRequest {
    pub user_id: i64,
    #[serde(default)]
    pub board_id: Option<i64>,
    pub task_type: String,
    #[serde(default)]
    pub mode: ProcessingMode,
    #[serde(default)]
    pub complexity_preference: ComplexityPreference,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    #[serde(default)]
    pub budget_limit_wtu: Option<i64>,
    #[serde(default)]
    pub user_preferences: Option<UserModelPreferences>,
}

fn default_quality_threshold() -> f64 {
    0.85
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingModeResponse {
    pub selected_mode: SelectedMode,
    pub reason: String,
    pub estimated_time_seconds: i64,
    pub estimated_wtu: f64,
    pub quality_expectation: f64,
    pub cost_efficiency_score: f64,
    pub recommended_models: Vec<String>,
    /// Only the agent path can fall back (to legacy).
    pub fallback_available: bool,
}

/// Historical per-mode quality numbers. Until the comparison table is
/// populated these are deployment-level priors.
#[derive(Debug, Clone)]
pub struct ModePerformance {
    pub legacy_success_rate: f64,
    pub agent_avg_quality: f64,
}

impl Default for ModePerformance {
    fn default() -> Self {
        Self {
            legacy_success_rate: 0.96,
            agent_avg_quality: 0.92,
        }
    }
}

pub struct ProcessingModeService {
    accountant: Arc<WtuAccountant>,
    catalog: Arc<ModelCatalogService>,
    performance: ModePerformance,
}

impl ProcessingModeService {
    pub fn new(accountant: Arc<WtuAccountant>, catalog: Arc<ModelCatalogService>) -> Self {
        Self {
            accountant,
            catalog,
            performance: ModePerformance::default(),
        }
    }

    pub fn with_performance(mut self, performance: ModePerformance) -> Self {
        self.performance = performance;
        self
    }

    /// Decide the processing mode for a request. Never errors: any
    /// internal failure becomes a legacy recommendation with the error
    /// recorded in `reason`.
    pub async fn select_processing_mode(
        &self,
        request: &ProcessingModeRequest,
    ) -> ProcessingModeResponse {
        info!(
            user_id = request.user_id,
            mode = ?request.mode,
            task_type = %request.task_type,
            "Selecting processing mode"
        );

        match request.mode {
            ProcessingMode::Legacy => self.legacy_response(request, None).await,
            ProcessingMode::Agent => self.agent_response(request, None).await,
            ProcessingMode::Auto => match self.recommend_optimal_mode(request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "Mode recommendation failed, defaulting to legacy");
                    self.legacy_response(
                        request,
                        Some(format!("Safe mode selected after an internal error: {e}")),
                    )
                    .await
                }
            },
        }
    }

    async fn recommend_optimal_mode(
        &self,
        request: &ProcessingModeRequest,
    ) -> Result<ProcessingModeResponse> {
        let monthly_wtu = self
            .accountant
            .monthly_usage(request.user_id, current_plan_month())
            .await?;

        let preferences = request
            .user_preferences
            .clone()
            .unwrap_or_else(UserModelPreferences::balanced);

        let legacy_score =
            self.mode_score(SelectedMode::Legacy, request, monthly_wtu, &preferences);
        let agent_score = self.mode_score(SelectedMode::Agent, request, monthly_wtu, &preferences);

        info!(legacy_score, agent_score, "Mode scores computed");

        if agent_score > legacy_score {
            let reason = recommendation_reason(SelectedMode::Agent, agent_score, legacy_score, request);
            Ok(self.agent_response(request, Some(reason)).await)
        } else {
            let reason =
                recommendation_reason(SelectedMode::Legacy, legacy_score, agent_score, request);
            Ok(self.legacy_response(request, Some(reason)).await)
        }
    }

    fn mode_score(
        &self,
        mode: SelectedMode,
        request: &ProcessingModeRequest,
        monthly_wtu: i64,
        preferences: &UserModelPreferences,
    ) -> f64 {
        let legacy = mode == SelectedMode::Legacy;
        let mut score = if legacy { 7.0 } else { 6.0 };

        score += match (request.complexity_preference, legacy) {
            (ComplexityPreference::Fast, true) => 2.0,
            (ComplexityPreference::Fast, false) => 0.5,
            (ComplexityPreference::Balanced, true) => 1.0,
            (ComplexityPreference::Balanced, false) => 1.5,
            (ComplexityPreference::Thorough, true) => 0.5,
            (ComplexityPreference::Thorough, false) => 2.5,
        };

        score += if request.quality_threshold >= 0.95 {
            if legacy { 0.5 } else { 2.0 }
        } else if request.quality_threshold >= 0.90 {
            if legacy { 1.0 } else { 1.5 }
        } else if legacy {
            1.0
        } else {
            0.8
        };

        // Month-to-date usage against the soft budget; the current
        // request's estimate is intentionally not added here, admission
        // control happens in the router.
        let budget_limit = request.budget_limit_wtu.or(preferences.budget_limit_wtu);
        if let Some(limit) = budget_limit {
            if monthly_wtu as f64 > limit as f64 * 0.8 {
                score += if legacy { 1.5 } else { -1.0 };
            }
        }

        if legacy && self.performance.legacy_success_rate > 0.95 {
            score += 1.0;
        } else if !legacy && self.performance.agent_avg_quality > 0.9 {
            score += 1.5;
        }

        match preferences.quality_preference {
            QualityPreference::Quality if !legacy => score += 1.0,
            QualityPreference::Speed if legacy => score += 1.0,
            _ => {}
        }

        match preferences.cost_sensitivity {
            CostSensitivity::High if legacy => score += 1.0,
            CostSensitivity::Low if !legacy => score += 0.5,
            _ => {}
        }

        score
    }

    async fn recommended_models(&self, tiers: &[LlmTier]) -> Vec<String> {
        let mut aliases = Vec::new();
        for tier in tiers {
            if let Ok(models) = self.catalog.get_models_by_tier(*tier).await {
                aliases.extend(models.into_iter().map(|m| m.alias));
            }
        }
        aliases
    }

    async fn legacy_response(
        &self,
        request: &ProcessingModeRequest,
        custom_reason: Option<String>,
    ) -> ProcessingModeResponse {
        let fast = request.complexity_preference == ComplexityPreference::Fast;

        ProcessingModeResponse {
            selected_mode: SelectedMode::Legacy,
            reason: custom_reason.unwrap_or_else(|| {
                "Stable, proven performance with good cost efficiency".to_string()
            }),
            estimated_time_seconds: if fast { 15 } else { 30 },
            estimated_wtu: if fast { 1.0 } else { 2.0 },
            quality_expectation: if fast { 0.85 } else { 0.88 },
            cost_efficiency_score: 0.9,
            recommended_models: self.recommended_models(&[LlmTier::Light]).await,
            fallback_available: false,
        }
    }

    async fn agent_response(
        &self,
        request: &ProcessingModeRequest,
        custom_reason: Option<String>,
    ) -> ProcessingModeResponse {
        let complexity_multiplier = match request.complexity_preference {
            ComplexityPreference::Fast => 1.0,
            ComplexityPreference::Balanced => 1.5,
            ComplexityPreference::Thorough => 2.0,
        };

        ProcessingModeResponse {
            selected_mode: SelectedMode::Agent,
            reason: custom_reason
                .unwrap_or_else(|| "High-quality analysis with validation".to_string()),
            estimated_time_seconds: (45.0 * complexity_multiplier) as i64,
            estimated_wtu: 3.0 * complexity_multiplier,
            quality_expectation: (0.88 + (complexity_multiplier - 1.0) * 0.05).min(0.95),
            cost_efficiency_score: 0.7,
            recommended_models: self
                .recommended_models(&[LlmTier::Premium, LlmTier::Standard, LlmTier::Light])
                .await,
            fallback_available: true,
        }
    }
}

fn recommendation_reason(
    selected: SelectedMode,
    selected_score: f64,
    other_score: f64,
    request: &ProcessingModeRequest,
) -> String {
    let mut reasons: Vec<String> = Vec::new();

    match selected {
        SelectedMode::Agent => {
            reasons.push("Fits high quality requirements".to_string());
            if request.quality_threshold >= 0.9 {
                reasons.push(format!(
                    "Can reach the {} quality threshold",
                    request.quality_threshold
                ));
            }
            if request.complexity_preference == ComplexityPreference::Thorough {
                reasons.push("Matches the thorough analysis preference".to_string());
            }
        }
        SelectedMode::Legacy => {
            reasons.push("Stable, proven performance".to_string());
            if request.complexity_preference == ComplexityPreference::Fast {
                reasons.push("Matches the fast processing preference".to_string());
            }
            reasons.push("Cost efficient".to_string());
        }
    }

    let diff = (selected_score - other_score).abs();
    reasons.push(if diff > 2.0 {
        "Clear performance advantage".to_string()
    } else if diff > 1.0 {
        "Better fit".to_string()
    } else {
        "Balanced choice".to_string()
    });

    reasons.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DatabasePool, SqliteCatalogRepository, SqliteQuotaRepository};

    async fn service() -> ProcessingModeService {
        let pool = DatabasePool::new_in_memory().await.unwrap();
        let catalog = Arc::new(ModelCatalogService::new(Arc::new(
            SqliteCatalogRepository::new(pool.pool().clone()),
        )));
        let accountant = Arc::new(WtuAccountant::new(
            Arc::new(SqliteQuotaRepository::new(pool.pool().clone())),
            catalog.clone(),
        ));
        ProcessingModeService::new(accountant, catalog)
    }

    fn request(complexity: ComplexityPreference, quality: f64) -> ProcessingModeRequest {
        ProcessingModeRequest {
            user_id: 1,
            board_id: None,
            task_type: "board_analysis".to_string(),
            mode: ProcessingMode::Auto,
            complexity_preference: complexity,
            quality_threshold: quality,
            budget_limit_wtu: None,
            user_preferences: None,
        }
    }

    #[tokio::test]
    async fn test_fast_low_quality_prefers_legacy() {
        let service = service().await;
        let response = service
            .select_processing_mode(&request(ComplexityPreference::Fast, 0.85))
            .await;
        assert_eq!(response.selected_mode, SelectedMode::Legacy);
        assert!(!response.fallback_available);
        assert_eq!(response.estimated_time_seconds, 15);
    }

    #[tokio::test]
    async fn test_thorough_high_quality_prefers_agent() {
        let service = service().await;
        let response = service
            .select_processing_mode(&request(ComplexityPreference::Thorough, 0.97))
            .await;
        assert_eq!(response.selected_mode, SelectedMode::Agent);
        assert!(response.fallback_available);
        assert_eq!(response.estimated_time_seconds, 90);
        assert!((response.estimated_wtu - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_explicit_mode_is_respected() {
        let service = service().await;
        let mut req = request(ComplexityPreference::Thorough, 0.99);
        req.mode = ProcessingMode::Legacy;

        let response = service.select_processing_mode(&req).await;
        assert_eq!(response.selected_mode, SelectedMode::Legacy);
    }

    #[tokio::test]
    async fn test_budget_pressure_pushes_toward_legacy() {
        let service = service().await;

        // A user deep into their budget, asking for balanced quality work
        let mut quota = crate::domain::UserTokenQuota::new(5, current_plan_month(), 100);
        quota.consume(90);
        service.accountant.set_quota(&quota).await.unwrap();

        let mut req = request(ComplexityPreference::Balanced, 0.92);
        req.user_id = 5;
        req.budget_limit_wtu = Some(100);

        let response = service.select_processing_mode(&req).await;
        assert_eq!(response.selected_mode, SelectedMode::Legacy);
    }
}
