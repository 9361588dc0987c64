//! Content extraction boundary.
//!
//! Raw HTML/transcript/PDF handling lives outside this crate; the
//! pipeline only needs plain text back. The passthrough implementation
//! covers deployments where the transport already delivers text.

use sha2::{Digest, Sha256};

use crate::domain::{ClipOpsError, Result};

/// SHA-256 hex digest; used for both cache keys and content hashes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn hash_text(text: &str) -> String {
    hash_bytes(text.as_bytes())
}

#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Plain text of a web page given its HTML.
    async fn extract_webpage(&self, html: &str) -> Result<String>;

    /// Plain text transcript of a video.
    async fn extract_youtube(&self, transcript: &str) -> Result<String>;

    /// Plain text of a PDF document.
    async fn extract_pdf(&self, bytes: &[u8]) -> Result<String>;
}

/// Treats inputs as already-extracted text. Collapses whitespace runs
/// and rejects empty documents.
pub struct PassthroughExtractor;

fn tidy(text: &str) -> Result<String> {
    let cleaned = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        return Err(ClipOpsError::ExtractionFailed(
            "document contained no text".to_string(),
        ));
    }
    Ok(cleaned)
}

#[async_trait::async_trait]
impl ContentExtractor for PassthroughExtractor {
    async fn extract_webpage(&self, html: &str) -> Result<String> {
        tidy(html)
    }

    async fn extract_youtube(&self, transcript: &str) -> Result<String> {
        tidy(transcript)
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<String> {
        tidy(&String::from_utf8_lossy(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_text("hello"), hash_text("hello"));
        assert_ne!(hash_text("hello"), hash_text("hello "));
        assert_eq!(hash_text("hello").len(), 64);
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let extractor = PassthroughExtractor;
        let err = extractor.extract_webpage("  \n \n ").await.unwrap_err();
        assert!(matches!(err, ClipOpsError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_whitespace_normalization() {
        let extractor = PassthroughExtractor;
        let text = extractor
            .extract_webpage("  title \n\n\n  body  \n")
            .await
            .unwrap();
        assert_eq!(text, "title\nbody");
    }
}
