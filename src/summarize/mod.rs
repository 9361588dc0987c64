//! Summarization pipeline: the WTU-economizing fast path.
//!
//! extractor -> cache lookup -> three light-tier LLM calls (summary,
//! tag candidates, category candidates) -> cache write -> per-user
//! personalization. A cache hit with an unchanged content hash skips
//! the LLM work entirely but still personalizes on the way out.

pub mod parsers;
pub mod prompts;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::accounting::WtuAccountant;
use crate::cache::{cache_key_for_bytes, cache_key_for_url, SummaryCache};
use crate::domain::{
    current_plan_month, CacheType, LlmMessage, LlmResult, LlmTier, Result, SummaryCacheEntry,
};
use crate::extract::{hash_text, ContentExtractor};
use crate::gateway::CompletionOptions;
use crate::personalization::PersonalizationService;
use crate::tiered::TieredClient;

const SUMMARY_TEMPERATURE: f64 = 0.3;
const LIST_TEMPERATURE: f64 = 0.2;
const SUMMARY_MAX_TOKENS: i64 = 400;
const PDF_SUMMARY_MAX_TOKENS: i64 = 500;
const TAG_MAX_TOKENS: i64 = 200;
const CATEGORY_MAX_TOKENS: i64 = 150;

pub const DEFAULT_TAG_COUNT: usize = 5;

/// What to summarize. URL-keyed sources carry their extraction input;
/// PDFs are keyed by the raw bytes themselves.
#[derive(Debug, Clone)]
pub enum SummarizeSource<'a> {
    Webpage { url: &'a str, html: &'a str },
    Youtube { url: &'a str, transcript: &'a str },
    Pdf { bytes: &'a [u8] },
}

impl SummarizeSource<'_> {
    pub fn cache_type(&self) -> CacheType {
        match self {
            SummarizeSource::Webpage { .. } => CacheType::Webpage,
            SummarizeSource::Youtube { .. } => CacheType::Youtube,
            SummarizeSource::Pdf { .. } => CacheType::Pdf,
        }
    }

    fn cache_key(&self) -> String {
        match self {
            SummarizeSource::Webpage { url, .. } => cache_key_for_url(url),
            SummarizeSource::Youtube { url, .. } => cache_key_for_url(url),
            SummarizeSource::Pdf { bytes } => cache_key_for_bytes(bytes),
        }
    }
}

/// Pipeline result: personalized tags/category plus the raw candidates.
#[derive(Debug, Clone, Serialize)]
pub struct SummarizeOutcome {
    pub content_hash: String,
    pub extracted_text: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub candidate_tags: Vec<String>,
    pub candidate_categories: Vec<String>,
    pub cached: bool,
    pub wtu_cost: i64,
}

struct PipelineCalls {
    summary: LlmResult,
    tags: LlmResult,
    categories: LlmResult,
}

pub struct SummarizationService {
    tiered: Arc<TieredClient>,
    cache: SummaryCache,
    extractor: Arc<dyn ContentExtractor>,
    personalization: Arc<PersonalizationService>,
    accountant: Arc<WtuAccountant>,
}

impl SummarizationService {
    pub fn new(
        tiered: Arc<TieredClient>,
        cache: SummaryCache,
        extractor: Arc<dyn ContentExtractor>,
        personalization: Arc<PersonalizationService>,
        accountant: Arc<WtuAccountant>,
    ) -> Self {
        Self {
            tiered,
            cache,
            extractor,
            personalization,
            accountant,
        }
    }

    async fn extract(&self, source: &SummarizeSource<'_>) -> Result<String> {
        match source {
            SummarizeSource::Webpage { html, .. } => self.extractor.extract_webpage(html).await,
            SummarizeSource::Youtube { transcript, .. } => {
                self.extractor.extract_youtube(transcript).await
            }
            SummarizeSource::Pdf { bytes } => self.extractor.extract_pdf(bytes).await,
        }
    }

    async fn light_call(&self, prompt: String, temperature: f64, max_tokens: i64) -> Result<LlmResult> {
        self.tiered
            .call(
                LlmTier::Light,
                &[LlmMessage::user(prompt)],
                &CompletionOptions::new(temperature).with_max_tokens(max_tokens),
            )
            .await
    }

    /// The three-call LLM pipeline; every call goes through the tiered
    /// caller so provider fallback applies per call.
    async fn run_llm_pipeline(
        &self,
        source: &SummarizeSource<'_>,
        extracted_text: &str,
    ) -> Result<PipelineCalls> {
        let (summary_prompt, max_tokens) = match source {
            SummarizeSource::Webpage { .. } => {
                (prompts::webpage_summary(extracted_text), SUMMARY_MAX_TOKENS)
            }
            SummarizeSource::Youtube { .. } => {
                (prompts::youtube_summary(extracted_text), SUMMARY_MAX_TOKENS)
            }
            SummarizeSource::Pdf { .. } => {
                (prompts::pdf_summary(extracted_text), PDF_SUMMARY_MAX_TOKENS)
            }
        };

        let summary = self
            .light_call(summary_prompt, SUMMARY_TEMPERATURE, max_tokens)
            .await?;
        let summary_text = summary.content.trim().to_string();

        let tags = self
            .light_call(
                prompts::tag_extraction(&summary_text),
                LIST_TEMPERATURE,
                TAG_MAX_TOKENS,
            )
            .await?;

        let categories = self
            .light_call(
                prompts::category_prediction(&summary_text),
                LIST_TEMPERATURE,
                CATEGORY_MAX_TOKENS,
            )
            .await?;

        Ok(PipelineCalls {
            summary,
            tags,
            categories,
        })
    }

    async fn record_call_usage(&self, user_id: i64, call: &LlmResult) -> Result<i64> {
        let wtu = self
            .accountant
            .compute_wtu(call.input_tokens, call.output_tokens, &call.model_alias)
            .await?;
        self.accountant
            .record_usage(user_id, current_plan_month(), wtu, &call.model_alias, None)
            .await?;
        Ok(wtu)
    }

    async fn personalized(
        &self,
        user_id: i64,
        tag_count: usize,
        candidate_tags: &[String],
        candidate_categories: &[String],
    ) -> Result<(Vec<String>, Option<String>)> {
        let tags = self
            .personalization
            .personalize_tags(candidate_tags, user_id, tag_count)
            .await?;
        let category = self
            .personalization
            .personalize_category(candidate_categories, user_id)
            .await?;
        Ok((tags, category))
    }

    /// Run the pipeline for one source.
    ///
    /// `refresh = true` bypasses the cache read (the write still
    /// happens). A hit whose stored content hash no longer matches the
    /// freshly extracted text is treated as stale and regenerated.
    pub async fn summarize(
        &self,
        source: SummarizeSource<'_>,
        user_id: i64,
        tag_count: usize,
        refresh: bool,
    ) -> Result<SummarizeOutcome> {
        let cache_key = source.cache_key();
        let cache_type = source.cache_type();

        // Extraction is delegated; an empty document fails here before
        // any LLM work or cache write.
        let extracted_text = self.extract(&source).await?;
        let content_hash = hash_text(&extracted_text);

        if refresh {
            info!(%cache_type, cache_key = %cache_key, user_id, "Summary cache refresh requested");
        } else if let Some(entry) = self.cache.lookup(&cache_key, cache_type).await? {
            if entry.content_hash == content_hash {
                info!(%cache_type, cache_key = %cache_key, user_id, "Summary cache hit");
                let (tags, category) = self
                    .personalized(
                        user_id,
                        tag_count,
                        &entry.candidate_tags,
                        &entry.candidate_categories,
                    )
                    .await?;

                return Ok(SummarizeOutcome {
                    content_hash: entry.content_hash,
                    extracted_text: entry.extracted_text,
                    summary: entry.summary,
                    tags,
                    category,
                    candidate_tags: entry.candidate_tags,
                    candidate_categories: entry.candidate_categories,
                    cached: true,
                    wtu_cost: entry.wtu_cost,
                });
            }
            info!(%cache_type, cache_key = %cache_key, "Cached content hash is stale, regenerating");
        } else {
            info!(%cache_type, cache_key = %cache_key, user_id, "Summary cache miss");
        }

        let calls = self.run_llm_pipeline(&source, &extracted_text).await?;

        let summary_text = calls.summary.content.trim().to_string();
        let candidate_tags = parsers::parse_json_array(&calls.tags.content);
        let candidate_categories = parsers::parse_json_array(&calls.categories.content);

        let mut wtu_cost = 0;
        for call in [&calls.summary, &calls.tags, &calls.categories] {
            wtu_cost += self.record_call_usage(user_id, call).await?;
        }

        let entry = SummaryCacheEntry::new(
            &cache_key,
            cache_type,
            &content_hash,
            &extracted_text,
            &summary_text,
        )
        .with_candidates(candidate_tags.clone(), candidate_categories.clone())
        .with_wtu_cost(wtu_cost);
        self.cache.store(&entry).await?;

        let (tags, category) = self
            .personalized(user_id, tag_count, &candidate_tags, &candidate_categories)
            .await?;

        Ok(SummarizeOutcome {
            content_hash,
            extracted_text,
            summary: summary_text,
            tags,
            category,
            candidate_tags,
            candidate_categories,
            cached: false,
            wtu_cost,
        })
    }

    /// Record that the user accepted tags/category for a saved item.
    pub async fn confirm_selection(
        &self,
        user_id: i64,
        accepted_tags: &[String],
        accepted_category: Option<&str>,
    ) -> Result<()> {
        self.personalization
            .record_usage(user_id, accepted_tags, accepted_category)
            .await
    }
}
