//! Per-user re-ranking of LLM-proposed tag and category candidates.
//!
//! Each candidate is scored as
//! `base + w1*personalization + w2*recency + w3*popularity`:
//! - base keeps the LLM's ordering as a prior (linear decay 1.0 -> 0.1),
//! - personalization is embedding similarity against the user's history
//!   weighted by use frequency,
//! - recency decays exponentially from the tag's last use,
//! - popularity normalizes global use counts against the top tag.
//!
//! With no history the base + popularity terms remain, so a cold-start
//! user degrades to the LLM ordering rather than an error.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{normalize_tag, Result, UserTagStat};
use crate::storage::TagRepository;
use crate::tiered::TieredClient;

const GLOBAL_STATS_WINDOW: i64 = 100;

#[derive(Debug, Clone)]
pub struct PersonalizationConfig {
    pub personalization_weight: f64,
    pub recency_weight: f64,
    pub popularity_weight: f64,
    /// Divisor that maps `similarity * ln(1 + use_count)` into [0, 1];
    /// calibrated for ln(1 + 50) with strong similarity.
    pub normalization_factor: f64,
    /// Days until recency decays to 1/e.
    pub recency_half_life_days: f64,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            personalization_weight: 0.5,
            recency_weight: 0.2,
            popularity_weight: 0.1,
            normalization_factor: 0.25,
            recency_half_life_days: 30.0,
        }
    }
}

/// One candidate with its score breakdown, mostly for logs and tests.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: String,
    pub final_score: f64,
    pub base_score: f64,
    pub personalization_score: f64,
    pub recency_score: f64,
    pub popularity_score: f64,
}

pub struct PersonalizationService {
    tags: Arc<dyn TagRepository>,
    tiered: Arc<TieredClient>,
    config: PersonalizationConfig,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += (*x as f64).powi(2);
        norm_b += (*y as f64).powi(2);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Linear decay preserving LLM order: first candidate 1.0, last 0.1.
fn base_score(index: usize, total: usize) -> f64 {
    1.0 - 0.9 * index as f64 / (total.saturating_sub(1).max(1)) as f64
}

impl PersonalizationService {
    pub fn new(tags: Arc<dyn TagRepository>, tiered: Arc<TieredClient>) -> Self {
        Self::with_config(tags, tiered, PersonalizationConfig::default())
    }

    pub fn with_config(
        tags: Arc<dyn TagRepository>,
        tiered: Arc<TieredClient>,
        config: PersonalizationConfig,
    ) -> Self {
        Self {
            tags,
            tiered,
            config,
        }
    }

    async fn personalization_score(&self, candidate: &str, user_tags: &[UserTagStat]) -> f64 {
        if user_tags.is_empty() {
            return 0.0;
        }

        let candidate_embedding = match self.tiered.embed(candidate).await {
            Ok(embedding) => embedding,
            Err(e) => {
                // A single candidate's embedding failure must not fail
                // the request; it just loses its similarity term.
                warn!(candidate, error = %e, "Failed to embed candidate, personalization=0");
                return 0.0;
            }
        };

        let mut max_score = 0.0f64;
        for tag in user_tags {
            let Some(embedding) = &tag.embedding_vector else {
                continue;
            };
            let similarity = cosine_similarity(&candidate_embedding, embedding);
            let score = similarity * ((tag.use_count + 1) as f64).ln();
            max_score = max_score.max(score);
        }

        (max_score / self.config.normalization_factor).min(1.0)
    }

    fn recency_score(&self, candidate: &str, user_tags: &[UserTagStat]) -> f64 {
        let normalized = normalize_tag(candidate);
        let matching = user_tags
            .iter()
            .find(|t| t.tag_name == normalized)
            .and_then(|t| t.last_used_at);

        match matching {
            Some(last_used) => {
                let days = (Utc::now() - last_used).num_days() as f64;
                (-days / self.config.recency_half_life_days).exp()
            }
            None => 0.0,
        }
    }

    async fn popularity_score(&self, candidate: &str) -> Result<f64> {
        let stats = self.tags.global_tag_stats(GLOBAL_STATS_WINDOW).await?;
        let Some(top) = stats.first() else {
            return Ok(0.0);
        };

        let normalized = normalize_tag(candidate);
        let Some(matching) = stats.iter().find(|s| s.tag_name == normalized) else {
            return Ok(0.0);
        };

        Ok(matching.total_use_count as f64 / (top.total_use_count as f64).max(1.0))
    }

    /// Score all candidates for a user, preserving input order on ties.
    pub async fn score_candidates(
        &self,
        candidates: &[String],
        user_id: i64,
    ) -> Result<Vec<ScoredCandidate>> {
        let user_tags = self.tags.user_tag_stats(user_id).await?;
        let mut scored = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let base = base_score(index, candidates.len());
            let personalization = self.personalization_score(candidate, &user_tags).await;
            let recency = self.recency_score(candidate, &user_tags);
            let popularity = self.popularity_score(candidate).await?;

            let final_score = base
                + self.config.personalization_weight * personalization
                + self.config.recency_weight * recency
                + self.config.popularity_weight * popularity;

            debug!(
                candidate,
                final_score, base, personalization, recency, popularity, "Scored candidate"
            );

            scored.push(ScoredCandidate {
                candidate: candidate.clone(),
                final_score,
                base_score: base,
                personalization_score: personalization,
                recency_score: recency,
                popularity_score: popularity,
            });
        }

        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        Ok(scored)
    }

    /// Top `count` tags for the user out of the LLM's candidates.
    pub async fn personalize_tags(
        &self,
        candidate_tags: &[String],
        user_id: i64,
        count: usize,
    ) -> Result<Vec<String>> {
        if candidate_tags.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            user_id,
            candidates = candidate_tags.len(),
            count,
            "Personalizing tags"
        );

        let scored = self.score_candidates(candidate_tags, user_id).await?;
        let result: Vec<String> = scored
            .into_iter()
            .take(count)
            .map(|s| s.candidate)
            .collect();

        info!(user_id, ?result, "Personalized tags");
        Ok(result)
    }

    /// Best single category. Scored on base + personalization only;
    /// recency and popularity describe tag behavior, not categories.
    pub async fn personalize_category(
        &self,
        candidate_categories: &[String],
        user_id: i64,
    ) -> Result<Option<String>> {
        if candidate_categories.is_empty() {
            return Ok(None);
        }

        let user_tags = self.tags.user_tag_stats(user_id).await?;
        let mut best: Option<(f64, &String)> = None;

        for (index, category) in candidate_categories.iter().enumerate() {
            let base = base_score(index, candidate_categories.len());
            let personalization = self.personalization_score(category, &user_tags).await;
            let score = base + self.config.personalization_weight * personalization;

            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, category)),
            }
        }

        Ok(best.map(|(_, category)| category.clone()))
    }

    /// Write path: called when the user confirms a saved item. Upserts
    /// master rows, bumps per-user counts, and tries to backfill missing
    /// embeddings in place.
    pub async fn record_usage(
        &self,
        user_id: i64,
        accepted_tags: &[String],
        accepted_category: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut accepted: Vec<&str> = accepted_tags.iter().map(String::as_str).collect();
        if let Some(category) = accepted_category {
            accepted.push(category);
        }

        info!(user_id, count = accepted.len(), "Recording tag usage");

        for raw in accepted {
            let tag = self.tags.get_or_create_tag(raw).await?;
            self.tags.upsert_user_usage(user_id, tag.id, now).await?;

            if tag.embedding_vector.is_none() {
                match self.tiered.embed(&tag.tag_name).await {
                    Ok(embedding) => {
                        self.tags.set_embedding(&tag.tag_name, &embedding).await?;
                    }
                    Err(e) => {
                        warn!(tag = %tag.tag_name, error = %e, "Embedding backfill failed, leaving empty");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_score_decay() {
        assert!((base_score(0, 5) - 1.0).abs() < 1e-9);
        assert!((base_score(4, 5) - 0.1).abs() < 1e-9);
        // Single candidate keeps full score
        assert!((base_score(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
