//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_price_cache::{FetchError, ManualClock, PriceCache, PriceProvider};

/// Provider that replays queued responses per token and counts calls.
/// Tokens match case-insensitively, like the real providers.
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Result<f64, FetchError>>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(tokens: &[&str]) -> Self {
        let scripts = tokens
            .iter()
            .map(|t| (key(t), VecDeque::new()))
            .collect();
        Self {
            scripts: Mutex::new(scripts),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Every fetch sleeps this long (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, token_id: &str, response: Result<f64, FetchError>) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .get_mut(&key(token_id))
            .expect("token not registered with ScriptedProvider")
            .push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports(&self, token_id: &str) -> bool {
        self.scripts.lock().unwrap().contains_key(&key(token_id))
    }

    async fn fetch(&self, token_id: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&key(token_id)) {
                Some(queue) => queue
                    .pop_front()
                    .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string()))),
                None => Err(FetchError::UnknownToken(token_id.to_string())),
            }
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        response
    }
}

fn key(token_id: &str) -> String {
    token_id.trim().to_lowercase()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap()
}

/// Cache with a 60 s TTL over `provider`, driven by a manual clock at `t0()`.
pub fn cache_over(provider: Arc<ScriptedProvider>) -> (Arc<PriceCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let cache = PriceCache::new(provider, Duration::from_secs(60)).with_clock(clock.clone());
    (Arc::new(cache), clock)
}
