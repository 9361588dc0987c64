// API request/response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::orchestration::{RequestType, RetrievalMode};
use crate::routing::ProcessingMode;
use crate::summarize::DEFAULT_TAG_COUNT;

fn default_tag_count() -> usize {
    DEFAULT_TAG_COUNT
}

#[derive(Debug, Deserialize)]
pub struct WebpageSummarizeRequest {
    pub url: String,
    pub html_content: String,
    pub user_id: i64,
    #[serde(default = "default_tag_count")]
    pub tag_count: usize,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeSummarizeRequest {
    pub url: String,
    pub transcript: String,
    pub user_id: i64,
    #[serde(default = "default_tag_count")]
    pub tag_count: usize,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct PdfSummarizeRequest {
    /// Extracted PDF text; binary handling happens upstream.
    pub content: String,
    pub user_id: i64,
    #[serde(default = "default_tag_count")]
    pub tag_count: usize,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSelectionRequest {
    pub user_id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SmartRoutingRequest {
    pub request_type: String,
    #[serde(default)]
    pub request_data: Value,
    pub user_id: i64,
    #[serde(default)]
    pub board_id: Option<i64>,
    #[serde(default)]
    pub processing_mode: ProcessingMode,
}

#[derive(Debug, Deserialize)]
pub struct PlanStreamRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub user_id: i64,
    pub prompt: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub retrieval_mode: RetrievalMode,
    #[serde(default)]
    pub selected_contents: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
