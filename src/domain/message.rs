use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single chat message handed to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completed (non-streaming) LLM call result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    pub content: String,
    /// Catalog alias of the model that produced the result.
    pub model_alias: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl LlmResult {
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

/// Outcome of a single model attempt inside the tiered caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Model answered.
    Success,
    /// Model failed and a later model in the tier was tried.
    Fallback,
    /// Model failed and no models remained.
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Fallback => "fallback",
            CallStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(CallStatus::Success),
            "fallback" => Some(CallStatus::Fallback),
            "failed" => Some(CallStatus::Failed),
            _ => None,
        }
    }
}

/// Audit row written for every model attempt, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallLog {
    pub model_alias: String,
    pub tier: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Alias of the next model when status is `Fallback`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_to: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub response_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ModelCallLog {
    pub fn success(
        model_alias: impl Into<String>,
        tier: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
        response_time_ms: i64,
    ) -> Self {
        Self {
            model_alias: model_alias.into(),
            tier: tier.into(),
            status: CallStatus::Success,
            error_type: None,
            error_message: None,
            fallback_to: None,
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            response_time_ms: Some(response_time_ms),
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        model_alias: impl Into<String>,
        tier: impl Into<String>,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        fallback_to: Option<String>,
        response_time_ms: i64,
    ) -> Self {
        let status = if fallback_to.is_some() {
            CallStatus::Fallback
        } else {
            CallStatus::Failed
        };
        Self {
            model_alias: model_alias.into(),
            tier: tier.into(),
            status,
            error_type: Some(error_type.into()),
            error_message: Some(error_message.into()),
            fallback_to,
            input_tokens: None,
            output_tokens: None,
            response_time_ms: Some(response_time_ms),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_status_depends_on_fallback_target() {
        let with_next = ModelCallLog::failure("a", "light", "Provider", "boom", Some("b".into()), 5);
        assert_eq!(with_next.status, CallStatus::Fallback);

        let terminal = ModelCallLog::failure("c", "light", "Provider", "boom", None, 5);
        assert_eq!(terminal.status, CallStatus::Failed);
    }

    #[test]
    fn test_message_constructors() {
        let msg = LlmMessage::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
    }
}
