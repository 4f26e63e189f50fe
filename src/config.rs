// Configuration: layered loading (defaults -> config file -> environment
// -> CLI flags) producing the GatewayConfig the rest of the process reads
// from. Mirrors the layering every long-lived service in this crate's
// lineage uses, with provider secrets marked so the logging layer never
// prints them.

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::ranker::RankerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatorConfig {
    pub timeout_ms: u64,
}

impl Default for FederatorConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 24,
            max_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 86_400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankerStrategy {
    InMemory,
    Bm25,
}

impl Default for RankerStrategy {
    fn default() -> Self {
        RankerStrategy::InMemory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub strategy: RankerStrategy,
    pub type_boost_coefficient: f64,
    pub recency_half_life_seconds: u64,
    #[serde(default)]
    pub type_weights: HashMap<String, f64>,
    #[serde(default)]
    pub provider_weights: HashMap<String, f64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            strategy: RankerStrategy::InMemory,
            type_boost_coefficient: 0.5,
            recency_half_life_seconds: 30 * 24 * 60 * 60,
            type_weights: HashMap::new(),
            provider_weights: HashMap::new(),
        }
    }
}

impl RankingConfig {
    pub fn to_ranker_config(&self) -> RankerConfig {
        RankerConfig {
            config_type_weights: self.type_weights.clone(),
            provider_weights: self.provider_weights.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub federator: FederatorConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ranker: RankingConfig,
    /// `provider.<name>.*` blocks, forwarded verbatim as each provider's
    /// config map. Keys ending in a redaction marker (see
    /// `SENSITIVE_KEY_SUFFIXES`) are never included in a logged dump.
    #[serde(default)]
    pub providers: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub log_verbose: bool,
    #[serde(default)]
    pub log_quiet: bool,
}

impl GatewayConfig {
    pub fn federator_timeout(&self) -> Duration {
        Duration::from_millis(self.federator.timeout_ms)
    }

    /// Keys whose values are redacted from a logged configuration dump.
    const SENSITIVE_KEY_SUFFIXES: &'static [&'static str] = &["token", "secret", "password", "api_key", "apikey"];

    pub fn redacted_provider_config(&self, provider: &str) -> HashMap<String, serde_json::Value> {
        let Some(block) = self.providers.get(provider) else {
            return HashMap::new();
        };
        block
            .iter()
            .map(|(key, value)| {
                let lower = key.to_lowercase();
                if Self::SENSITIVE_KEY_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
                    (key.clone(), serde_json::Value::String("***redacted***".to_string()))
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }
}

/// Layers: compiled-in defaults -> optional config file -> `GATEWAY_`
/// environment variables -> CLI flags, highest priority last.
pub fn load(cli: &CliArgs) -> Result<GatewayConfig> {
    let config_path = cli.config.clone().unwrap_or_else(|| "config/gateway.toml".to_string());

    let mut builder = config::Config::builder().add_source(config::Config::try_from(&GatewayConfig::default())?);

    if std::path::Path::new(&config_path).exists() {
        builder = builder.add_source(config::File::with_name(&config_path));
    }

    builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

    let mut loaded: GatewayConfig = builder.build()?.try_deserialize()?;

    if cli.verbose {
        loaded.log_verbose = true;
    }
    if cli.quiet {
        loaded.log_quiet = true;
    }
    if let Some(port) = cli.port {
        loaded.providers.entry("_cli".to_string()).or_default().insert(
            "port".to_string(),
            serde_json::Value::Number(port.into()),
        );
    }

    Ok(loaded)
}

#[derive(Debug, Parser)]
#[command(name = "search-gateway", about = "Federated personal-data search gateway")]
pub struct CliArgs {
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "GATEWAY_PORT")]
    pub port: Option<u16>,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.federator.timeout_ms, 30_000);
        assert_eq!(config.query.default_page_size, 24);
        assert_eq!(config.cache.default_ttl_seconds, 86_400);
        assert_eq!(config.ranker.strategy, RankerStrategy::InMemory);
    }

    #[test]
    fn redaction_masks_secret_like_keys_only() {
        let mut config = GatewayConfig::default();
        let mut block = HashMap::new();
        block.insert("api_token".to_string(), serde_json::json!("shh"));
        block.insert("base_url".to_string(), serde_json::json!("https://example.com"));
        config.providers.insert("photos".to_string(), block);

        let redacted = config.redacted_provider_config("photos");
        assert_eq!(redacted.get("api_token").unwrap(), "***redacted***");
        assert_eq!(redacted.get("base_url").unwrap(), "https://example.com");
    }
}
