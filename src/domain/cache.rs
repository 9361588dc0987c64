use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What kind of source a cache entry was produced from. The cache key is
/// unique per type, so a URL clipped as a webpage and a video sharing the
/// same hash never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Webpage,
    Youtube,
    Pdf,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Webpage => "webpage",
            CacheType::Youtube => "youtube",
            CacheType::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webpage" => Some(CacheType::Webpage),
            "youtube" => Some(CacheType::Youtube),
            "pdf" => Some(CacheType::Pdf),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const DEFAULT_CACHE_TTL_DAYS: i64 = 30;

/// One cached summarization pipeline result.
///
/// Stores the unpersonalized candidate lists; personalization re-runs on
/// every read so user history changes take effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCacheEntry {
    /// Hash of the source URL (webpage/youtube) or raw bytes (pdf).
    pub cache_key: String,
    pub cache_type: CacheType,
    /// Hash of the extracted plain text; used to detect that a URL's
    /// content changed since the entry was written.
    pub content_hash: String,
    pub extracted_text: String,
    pub summary: String,
    pub candidate_tags: Vec<String>,
    pub candidate_categories: Vec<String>,
    /// Summed WTU of the three LLM calls that produced the entry.
    pub wtu_cost: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SummaryCacheEntry {
    pub fn new(
        cache_key: impl Into<String>,
        cache_type: CacheType,
        content_hash: impl Into<String>,
        extracted_text: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            cache_key: cache_key.into(),
            cache_type,
            content_hash: content_hash.into(),
            extracted_text: extracted_text.into(),
            summary: summary.into(),
            candidate_tags: Vec::new(),
            candidate_categories: Vec::new(),
            wtu_cost: 0,
            expires_at: now + Duration::days(DEFAULT_CACHE_TTL_DAYS),
            created_at: now,
        }
    }

    pub fn with_candidates(mut self, tags: Vec<String>, categories: Vec<String>) -> Self {
        self.candidate_tags = tags;
        self.candidate_categories = categories;
        self
    }

    pub fn with_wtu_cost(mut self, wtu_cost: i64) -> Self {
        self.wtu_cost = wtu_cost;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl() {
        let entry = SummaryCacheEntry::new("k", CacheType::Webpage, "h", "text", "summary");
        assert!(!entry.is_expired(Utc::now()));
        assert!(entry.is_expired(Utc::now() + Duration::days(31)));
    }

    #[test]
    fn test_cache_type_roundtrip() {
        for t in [CacheType::Webpage, CacheType::Youtube, CacheType::Pdf] {
            assert_eq!(CacheType::parse(t.as_str()), Some(t));
        }
    }
}
