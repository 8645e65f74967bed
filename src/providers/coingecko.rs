// CoinGecko `simple/price` provider

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use url::Url;

use super::{normalize_token, PriceProvider};
use crate::error::{BuildError, FetchError};
use crate::settings::ProviderSettings;

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// CoinGecko devuelve un objeto indexado por provider id: { "<id>": { "usd": price } }
type SimplePriceResponse = HashMap<String, SimplePriceQuote>;

#[derive(Debug, Deserialize)]
struct SimplePriceQuote {
    usd: Option<f64>,
}

/// One-request-per-call CoinGecko client.
///
/// Maps the caller's token id to CoinGecko's id through a static table,
/// sends a single GET with a fixed timeout and reports each failure mode as
/// its own [`FetchError`] variant. Unknown tokens fail before any I/O.
pub struct CoinGeckoProvider {
    client: reqwest::Client,
    endpoint: Url,
    token_ids: HashMap<String, String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl CoinGeckoProvider {
    /// Create a provider against `base_url` (e.g. `https://api.coingecko.com/api/v3`).
    pub fn new(
        base_url: &str,
        token_ids: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, BuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self::build(base_url, token_ids, timeout, headers, 0)
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, BuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, header_value("user-agent", &settings.user_agent)?);

        if let Some(key) = settings.api_key() {
            let name = HeaderName::from_bytes(settings.api_key_header.as_bytes()).map_err(|e| {
                BuildError::InvalidHeader {
                    name: settings.api_key_header.clone(),
                    reason: e.to_string(),
                }
            })?;
            let mut value = header_value(&settings.api_key_header, key)?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        Self::build(
            &settings.base_url,
            settings.token_ids.clone(),
            settings.timeout(),
            headers,
            settings.requests_per_minute,
        )
    }

    fn build(
        base_url: &str,
        token_ids: HashMap<String, String>,
        timeout: Duration,
        headers: HeaderMap,
        requests_per_minute: u32,
    ) -> Result<Self, BuildError> {
        let endpoint = Url::parse(&format!("{}/simple/price", base_url.trim_end_matches('/')))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let token_ids = token_ids
            .into_iter()
            .map(|(token, provider_id)| (normalize_token(&token), provider_id))
            .collect();

        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|per_minute| RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            endpoint,
            token_ids,
            limiter,
        })
    }

    /// CoinGecko id for an internal token id.
    pub fn provider_id(&self, token_id: &str) -> Option<&str> {
        self.token_ids.get(&normalize_token(token_id)).map(String::as_str)
    }

    fn request_url(&self, provider_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ids", provider_id)
            .append_pair("vs_currencies", "usd");
        url
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, BuildError> {
    HeaderValue::from_str(value).map_err(|e| BuildError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Extracts `body[provider_id].usd`.
pub fn parse_simple_price(body: &[u8], provider_id: &str) -> Result<f64, FetchError> {
    let response: SimplePriceResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let quote = response
        .get(provider_id)
        .ok_or_else(|| FetchError::Parse(format!("no quote for {}", provider_id)))?;

    match quote.usd {
        Some(price) if price >= 0.0 => Ok(price),
        Some(price) => Err(FetchError::Parse(format!(
            "negative price for {}: {}",
            provider_id, price
        ))),
        None => Err(FetchError::Parse(format!("usd field missing for {}", provider_id))),
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn supports(&self, token_id: &str) -> bool {
        self.provider_id(token_id).is_some()
    }

    async fn fetch(&self, token_id: &str) -> Result<f64, FetchError> {
        let provider_id = self
            .provider_id(token_id)
            .ok_or_else(|| FetchError::UnknownToken(token_id.to_string()))?;

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                warn!("CoinGecko: local request budget exhausted, skipping {}", token_id);
                return Err(FetchError::RateLimited);
            }
        }

        let url = self.request_url(provider_id);
        debug!("CoinGecko: GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Network(format!("request timed out: {}", e))
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                warn!("CoinGecko: rate limited (429) while fetching {}", token_id);
            }
            return Err(FetchError::Upstream(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("reading body failed: {}", e)))?;

        parse_simple_price(&body, provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> CoinGeckoProvider {
        let ids = HashMap::from([("Bitcoin".to_string(), "bitcoin".to_string())]);
        CoinGeckoProvider::new("https://api.coingecko.com/api/v3/", ids, Duration::from_secs(10))
            .unwrap()
    }

    #[test]
    fn test_parse_simple_price() {
        let body = br#"{"bitcoin":{"usd":43250.5}}"#;
        assert_eq!(parse_simple_price(body, "bitcoin"), Ok(43250.5));

        let integer = br#"{"ripple":{"usd":1}}"#;
        assert_eq!(parse_simple_price(integer, "ripple"), Ok(1.0));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_simple_price(b"{}", "bitcoin"), Err(FetchError::Parse(_))));
        assert!(matches!(
            parse_simple_price(br#"{"bitcoin":{}}"#, "bitcoin"),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(
            parse_simple_price(br#"{"bitcoin":{"usd":"high"}}"#, "bitcoin"),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(
            parse_simple_price(br#"{"bitcoin":{"usd":-1.0}}"#, "bitcoin"),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(parse_simple_price(b"<html>", "bitcoin"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_request_url() {
        let provider = provider();
        let url = provider.request_url("bitcoin");
        assert_eq!(
            url.as_str(),
            "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd"
        );
    }

    #[test]
    fn test_provider_id_lookup_ignores_case() {
        let provider = provider();
        assert_eq!(provider.provider_id("BITCOIN"), Some("bitcoin"));
        assert_eq!(provider.provider_id("Ethereum"), None);
    }

    #[tokio::test]
    async fn test_unknown_token_fails_without_request() {
        // Unroutable endpoint: a request would surface as Network, not UnknownToken
        let provider = CoinGeckoProvider::new("http://127.0.0.1:9", HashMap::new(), Duration::from_millis(50)).unwrap();
        assert_eq!(
            provider.fetch("Bitcoin").await,
            Err(FetchError::UnknownToken("Bitcoin".to_string()))
        );
    }
}
