//! Content-addressed summary cache.
//!
//! Keys are derived from what identifies the source (URL for pages and
//! videos, raw bytes for PDFs); the separate content hash detects that a
//! URL's content changed underneath its key. Entries hold candidate
//! lists only; personalization always happens on the read path.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{CacheType, Result, SummaryCacheEntry};
use crate::extract::{hash_bytes, hash_text};
use crate::storage::SummaryCacheRepository;

/// Cache key for URL-identified sources (webpage, youtube).
pub fn cache_key_for_url(url: &str) -> String {
    hash_text(url)
}

/// Cache key for byte-identified sources (pdf).
pub fn cache_key_for_bytes(bytes: &[u8]) -> String {
    hash_bytes(bytes)
}

#[derive(Clone)]
pub struct SummaryCache {
    repository: Arc<dyn SummaryCacheRepository>,
}

impl SummaryCache {
    pub fn new(repository: Arc<dyn SummaryCacheRepository>) -> Self {
        Self { repository }
    }

    /// Non-expired entry for the key, if present.
    pub async fn lookup(
        &self,
        cache_key: &str,
        cache_type: CacheType,
    ) -> Result<Option<SummaryCacheEntry>> {
        let entry = self.repository.get(cache_key, cache_type).await?;
        if entry.is_some() {
            metrics::increment_counter!("clipops_summary_cache_hits_total");
        } else {
            metrics::increment_counter!("clipops_summary_cache_misses_total");
        }
        Ok(entry)
    }

    /// Write or replace the entry for its key. Concurrent pipeline runs
    /// on the same key race benignly: last writer wins.
    pub async fn store(&self, entry: &SummaryCacheEntry) -> Result<()> {
        self.repository.upsert(entry).await
    }

    /// Janitor entry point; returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.repository.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "Summary cache sweep finished");
        }
        Ok(purged)
    }
}
