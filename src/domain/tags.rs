use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical tag row, created on demand the first time any user accepts
/// the tag. The embedding is backfilled lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMasterEntry {
    pub id: i64,
    /// Case-normalized (lowercase, trimmed).
    pub tag_name: String,
    pub embedding_vector: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// Normalize a tag for storage and comparison.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Per-user tag usage joined with the tag master, as consumed by the
/// personalizer.
#[derive(Debug, Clone)]
pub struct UserTagStat {
    pub tag_name: String,
    pub embedding_vector: Option<Vec<f32>>,
    pub use_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Aggregated use count across all users.
#[derive(Debug, Clone)]
pub struct GlobalTagStat {
    pub tag_name: String,
    pub total_use_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  FastAPI "), "fastapi");
        assert_eq!(normalize_tag("Rust"), "rust");
    }
}
