use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Which upstream implementation backs the cache.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// CoinGecko `simple/price` over HTTP
    Coingecko,
    /// Fixed prices from `provider.static_prices`, no network
    Static,
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Coingecko
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// CoinGecko demo/pro key. Empty means anonymous access.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Client-side request budget; 0 disables the limiter
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Internal token id -> provider id
    #[serde(default = "default_token_ids")]
    pub token_ids: HashMap<String, String>,
    /// Only read when `kind = "static"`
    #[serde(default)]
    pub static_prices: HashMap<String, f64>,
}

fn default_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_timeout_seconds() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("token-price-cache/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_api_key_header() -> String {
    "x-cg-demo-api-key".to_string()
}
fn default_requests_per_minute() -> u32 {
    30 // CoinGecko public tier
}

fn default_token_ids() -> HashMap<String, String> {
    [
        ("Bitcoin", "bitcoin"),
        ("Ethereum", "ethereum"),
        ("Ripple", "ripple"),
        ("rndr", "render-token"),
        ("bst", "blocksquare"),
        ("ybr", "yieldbricks"),
        ("rio", "realio-network"),
        ("props", "propbase"),
    ]
    .iter()
    .map(|(token, id)| (token.to_string(), id.to_string()))
    .collect()
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// API key with blank values treated as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
            api_key: None,
            api_key_header: default_api_key_header(),
            requests_per_minute: default_requests_per_minute(),
            token_ids: default_token_ids(),
            static_prices: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    60
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversionSettings {
    /// Currency code -> USD per unit
    #[serde(default = "default_rates_to_usd")]
    pub rates_to_usd: HashMap<String, f64>,
}

fn default_rates_to_usd() -> HashMap<String, f64> {
    let mut rates = HashMap::new();
    rates.insert("AED".to_string(), 0.27);
    rates.insert("USD".to_string(), 1.0);
    rates
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            rates_to_usd: default_rates_to_usd(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub conversion: ConversionSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    /// Loads `Config.toml` from the working directory (optional) plus
    /// `TPC_*` environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("TPC_PROVIDER_BASE_URL") {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                self.provider.base_url = trimmed.to_string();
            }
        }

        if let Ok(key) = env::var("TPC_PROVIDER_API_KEY") {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                self.provider.api_key = Some(trimmed.to_string());
            }
        }

        if let Ok(raw_ttl) = env::var("TPC_CACHE_TTL_SECONDS") {
            match raw_ttl.trim().parse::<u64>() {
                Ok(ttl) => self.cache.ttl_seconds = ttl,
                Err(e) => eprintln!("Failed to parse TPC_CACHE_TTL_SECONDS: {}", e),
            }
        }

        // JSON: { "Internal": "provider-id" }, merged over the file's table
        if let Ok(raw_ids) = env::var("TPC_PROVIDER_TOKEN_IDS") {
            let trimmed = raw_ids.trim();
            if !trimmed.is_empty() {
                match serde_json::from_str::<HashMap<String, String>>(trimmed) {
                    Ok(map) => {
                        for (token, provider_id) in map {
                            if !token.trim().is_empty() && !provider_id.trim().is_empty() {
                                self.provider.token_ids.insert(token, provider_id);
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("Failed to parse TPC_PROVIDER_TOKEN_IDS as JSON: {}", e);
                    }
                }
            }
        }
    }
}
