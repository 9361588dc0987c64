use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClipOpsError>;

#[derive(Error, Debug)]
pub enum ClipOpsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("All providers failed for tier '{tier}' (attempted: {attempted:?})")]
    AllProvidersFailed { tier: String, attempted: Vec<String> },

    #[error("No active models for tier '{0}'")]
    NoModelsForTier(String),

    #[error("Quota exceeded: needed {needed} WTU, {remaining} remaining")]
    QuotaExceeded { needed: i64, remaining: i64 },

    #[error("Content extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Agent input validation failed: {0}")]
    AgentValidationFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClipOpsError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ClipOpsError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        ClipOpsError::Validation(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ClipOpsError::Internal(msg.into())
    }

    pub fn provider<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        ClipOpsError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Provider-level failures are handled locally by tier fallback and
    /// never bubble to the caller as-is.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, ClipOpsError::Provider { .. })
    }
}
