use serde::{Deserialize, Serialize};

/// LLM provider behind a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
    Perplexity,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Perplexity => "perplexity",
            Provider::Other(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "anthropic" => Provider::Anthropic,
            "google" => Provider::Google,
            "perplexity" => Provider::Perplexity,
            other => Provider::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_roundtrip() {
        for p in [
            Provider::OpenAI,
            Provider::Anthropic,
            Provider::Google,
            Provider::Perplexity,
        ] {
            assert_eq!(Provider::parse(p.as_str()), p);
        }
    }

    #[test]
    fn test_unknown_provider() {
        let p = Provider::parse("groq");
        assert_eq!(p, Provider::Other("groq".to_string()));
        assert_eq!(p.as_str(), "groq");
    }
}
