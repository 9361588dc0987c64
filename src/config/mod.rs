use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Provider, Result};
use crate::gateway::http::default_base_url;
use crate::gateway::ProviderEndpoint;
use crate::storage::DatabaseConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_monthly_wtu")]
    pub default_monthly_wtu: i64,
}

fn default_monthly_wtu() -> i64 {
    crate::accounting::DEFAULT_MONTHLY_QUOTA_WTU
}

/// Per-provider credentials. A provider with neither a configured key
/// nor its conventional environment variable is disabled: its catalog
/// models are skipped during fallback iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: Option<ProviderSettings>,
    #[serde(default)]
    pub anthropic: Option<ProviderSettings>,
    #[serde(default)]
    pub google: Option<ProviderSettings>,
    #[serde(default)]
    pub perplexity: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProvidersConfig {
    fn resolve(
        provider: Provider,
        settings: &Option<ProviderSettings>,
        env_var: &str,
        endpoints: &mut HashMap<Provider, ProviderEndpoint>,
    ) {
        let settings = settings.clone().unwrap_or_default();
        let api_key = settings
            .api_key
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.is_empty());

        if let Some(api_key) = api_key {
            let base_url = settings
                .base_url
                .unwrap_or_else(|| default_base_url(&provider).to_string());
            endpoints.insert(provider, ProviderEndpoint::new(api_key, base_url));
        }
    }

    /// Endpoints for every provider with credentials; read once at
    /// startup.
    pub fn endpoints(&self) -> HashMap<Provider, ProviderEndpoint> {
        let mut endpoints = HashMap::new();
        Self::resolve(Provider::OpenAI, &self.openai, "OPENAI_API_KEY", &mut endpoints);
        Self::resolve(
            Provider::Anthropic,
            &self.anthropic,
            "ANTHROPIC_API_KEY",
            &mut endpoints,
        );
        Self::resolve(Provider::Google, &self.google, "GOOGLE_API_KEY", &mut endpoints);
        Self::resolve(
            Provider::Perplexity,
            &self.perplexity,
            "PERPLEXITY_API_KEY",
            &mut endpoints,
        );
        endpoints
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn default_sqlite() -> Self {
        Self {
            database: DatabaseConfig::sqlite("clip-ops.db"),
            api: Some(ApiConfig {
                bind: "127.0.0.1".to_string(),
                port: 8080,
            }),
            logging: LoggingConfig::default(),
            providers: ProvidersConfig::default(),
            quota: QuotaConfig {
                default_monthly_wtu: default_monthly_wtu(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_sqlite();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.quota.default_monthly_wtu, 10_000);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite::memory:"

            [providers.openai]
            api_key = "sk-test"
            "#,
        )
        .unwrap();

        let endpoints = config.providers.endpoints();
        assert!(endpoints.contains_key(&Provider::OpenAI));
        assert!(!endpoints.contains_key(&Provider::Perplexity)
            || std::env::var("PERPLEXITY_API_KEY").is_ok());
    }

    #[test]
    fn test_custom_base_url_is_kept() {
        let providers = ProvidersConfig {
            openai: Some(ProviderSettings {
                api_key: Some("sk-test".into()),
                base_url: Some("http://localhost:9999/v1".into()),
            }),
            ..Default::default()
        };
        let endpoints = providers.endpoints();
        assert_eq!(
            endpoints.get(&Provider::OpenAI).unwrap().base_url,
            "http://localhost:9999/v1"
        );
    }
}
