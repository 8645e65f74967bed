// Token Price Cache - TTL por token con fallback a precio viejo

use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::{BuildError, FetchError};
use crate::models::{CacheEntry, HoldingsValuation, PriceLookup, PriceSource};
use crate::providers::{self, normalize_token, PriceProvider};
use crate::settings::Settings;

/// Time-bounded, failure-tolerant cache in front of a [`PriceProvider`].
///
/// ## State per token
///
/// - **Uncached**: no entry; the next call fetches.
/// - **Fresh**: `now - fetched_at < ttl`; served without a fetch.
/// - **Stale**: `now - fetched_at >= ttl`; the next call fetches and falls
///   back to the old entry if that fetch fails.
///
/// ## Concurrency
///
/// Each token has its own async mutex, held for the whole
/// check-fetch-write sequence, so a slow round-trip for one token never
/// blocks another. Callers that queued behind a refresh receive that
/// refresh's outcome instead of issuing their own request: a burst of N
/// callers on an expired token costs one upstream call.
///
/// Fetch errors never leave this type. They become `stale` or `unavailable`
/// lookups and are only logged.
pub struct PriceCache {
    provider: Arc<dyn PriceProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slots: DashMap<String, Arc<TokenSlot>>,
    metrics: CacheMetrics,
}

struct TokenSlot {
    /// Bumped under `state`'s lock after every fetch attempt.
    generation: AtomicU64,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    entry: Option<CacheEntry>,
    last_outcome: Option<PriceLookup>,
}

impl TokenSlot {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            state: Mutex::new(SlotState::default()),
        }
    }
}

#[derive(Default)]
struct CacheMetrics {
    unsupported: AtomicU64,
    fresh_hits: AtomicU64,
    refreshes: AtomicU64,
    stale_served: AtomicU64,
    unavailable: AtomicU64,
    coalesced: AtomicU64,
    fetch_failures: AtomicU64,
}

impl PriceCache {
    pub fn new(provider: Arc<dyn PriceProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            clock: Arc::new(SystemClock),
            ttl,
            slots: DashMap::new(),
            metrics: CacheMetrics::default(),
        }
    }

    /// Replace the wall clock (tests, simulations).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Provider chosen by `settings.provider.kind`, TTL from `settings.cache`.
    pub fn from_settings(settings: &Settings) -> Result<Self, BuildError> {
        let provider = providers::build_provider(&settings.provider)?;
        Ok(Self::new(provider, settings.cache.ttl()))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current price for `token_id`. Never fails; see [`PriceSource`] for
    /// how the returned value was obtained.
    pub async fn get_price(&self, token_id: &str) -> PriceLookup {
        if !self.provider.supports(token_id) {
            warn!(
                "PriceCache: token {} is not supported by provider {}",
                token_id,
                self.provider.name()
            );
            self.metrics.unsupported.fetch_add(1, Ordering::Relaxed);
            return PriceLookup::unavailable();
        }

        // Providers match tokens case-insensitively, so one slot per normalized id
        let key = normalize_token(token_id);
        let slot = self.slot(&key);
        let seen_generation = slot.generation.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        // A refresh finished while we were waiting for the lock: share its result
        if slot.generation.load(Ordering::Acquire) != seen_generation {
            if let Some(outcome) = state.last_outcome.clone() {
                debug!(
                    "PriceCache: {} joined in-flight refresh ({})",
                    token_id, outcome.source
                );
                self.metrics.coalesced.fetch_add(1, Ordering::Relaxed);
                return outcome;
            }
        }

        if let Some(entry) = state.entry.as_ref() {
            if self.is_fresh(entry) {
                debug!("PriceCache: {} served from cache (${})", token_id, entry.price);
                self.metrics.fresh_hits.fetch_add(1, Ordering::Relaxed);
                return PriceLookup::from_entry(entry, PriceSource::Fresh);
            }
        }

        let outcome = match self.provider.fetch(token_id).await {
            Ok(price) => {
                let entry = CacheEntry {
                    token_id: key,
                    price,
                    fetched_at: self.clock.now(),
                };
                info!("PriceCache: {} refreshed from {}: ${}", token_id, self.provider.name(), price);
                self.metrics.refreshes.fetch_add(1, Ordering::Relaxed);
                let lookup = PriceLookup::from_entry(&entry, PriceSource::Refreshed);
                state.entry = Some(entry);
                lookup
            }
            Err(e) => {
                self.metrics.fetch_failures.fetch_add(1, Ordering::Relaxed);
                self.fallback(token_id, state.entry.as_ref(), &e)
            }
        };

        state.last_outcome = Some(outcome.clone());
        slot.generation.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Value of `quantity_held` units of `token_id` at the current price.
    /// Zero and negative quantities are passed through unchanged.
    pub async fn calculate_holdings(&self, token_id: &str, quantity_held: f64) -> HoldingsValuation {
        let lookup = self.get_price(token_id).await;
        HoldingsValuation::new(token_id, quantity_held, lookup)
    }

    /// Copy of the stored entry, waiting for any in-flight refresh.
    pub async fn entry(&self, token_id: &str) -> Option<CacheEntry> {
        let slot = self
            .slots
            .get(&normalize_token(token_id))
            .map(|s| Arc::clone(s.value()))?;
        let state = slot.state.lock().await;
        state.entry.clone()
    }

    /// Copies of every stored entry.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let slots: Vec<Arc<TokenSlot>> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(entry) = slot.state.lock().await.entry.clone() {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.token_id.cmp(&b.token_id));
        entries
    }

    /// Number of tokens that have been looked up (with or without a price).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        let fresh_hits = self.metrics.fresh_hits.load(Ordering::Relaxed);
        let coalesced = self.metrics.coalesced.load(Ordering::Relaxed);
        let refreshes = self.metrics.refreshes.load(Ordering::Relaxed);
        let stale_served = self.metrics.stale_served.load(Ordering::Relaxed);
        let unavailable = self.metrics.unavailable.load(Ordering::Relaxed);
        let total = fresh_hits + coalesced + refreshes + stale_served + unavailable;

        CacheMetricsSnapshot {
            unsupported: self.metrics.unsupported.load(Ordering::Relaxed),
            fresh_hits,
            refreshes,
            stale_served,
            unavailable,
            coalesced,
            fetch_failures: self.metrics.fetch_failures.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                (fresh_hits + coalesced) as f64 / total as f64
            } else {
                0.0
            },
            tokens: self.slots.len(),
        }
    }

    fn slot(&self, key: &str) -> Arc<TokenSlot> {
        // The DashMap shard guard is dropped before any await
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(TokenSlot::new()))
                .value(),
        )
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        // A clock that stepped backwards yields a negative age: keep serving
        match (self.clock.now() - entry.fetched_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }

    fn fallback(&self, token_id: &str, entry: Option<&CacheEntry>, cause: &FetchError) -> PriceLookup {
        match entry {
            Some(entry) => {
                warn!(
                    "PriceCache: refresh of {} failed ({}: {}), serving stale price ${} from {}",
                    token_id,
                    cause.kind(),
                    cause,
                    entry.price,
                    entry.fetched_at
                );
                self.metrics.stale_served.fetch_add(1, Ordering::Relaxed);
                PriceLookup::from_entry(entry, PriceSource::Stale)
            }
            None => {
                error!(
                    "PriceCache: no price available for {} ({}: {})",
                    token_id,
                    cause.kind(),
                    cause
                );
                self.metrics.unavailable.fetch_add(1, Ordering::Relaxed);
                PriceLookup::unavailable()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetricsSnapshot {
    /// Lookups rejected before reaching the cache; not part of `hit_rate`
    pub unsupported: u64,
    pub fresh_hits: u64,
    pub refreshes: u64,
    pub stale_served: u64,
    pub unavailable: u64,
    pub coalesced: u64,
    pub fetch_failures: u64,
    /// Share of lookups answered without a fetch of their own
    pub hit_rate: f64,
    pub tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::providers::StaticPriceProvider;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn cache_with_clock() -> (PriceCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
        let provider = StaticPriceProvider::new(HashMap::from([("Bitcoin".to_string(), 42.0)]));
        let cache = PriceCache::new(Arc::new(provider), Duration::from_secs(60)).with_clock(clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_refresh_then_fresh() {
        let (cache, clock) = cache_with_clock();

        let first = cache.get_price("Bitcoin").await;
        assert_eq!(first.source, PriceSource::Refreshed);
        assert_eq!(first.price, 42.0);
        assert_eq!(first.last_updated, Some(clock.now()));

        clock.advance(Duration::from_secs(59));
        let second = cache.get_price("Bitcoin").await;
        assert_eq!(second.source, PriceSource::Fresh);
        assert_eq!(second.last_updated, first.last_updated);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get_price("Bitcoin").await.source, PriceSource::Refreshed);
    }

    #[tokio::test]
    async fn test_unsupported_token_allocates_nothing() {
        let (cache, _clock) = cache_with_clock();
        let lookup = cache.get_price("Dogecoin").await;
        assert_eq!(lookup, PriceLookup::unavailable());
        assert!(cache.is_empty());

        let metrics = cache.metrics();
        assert_eq!(metrics.unsupported, 1);
        assert_eq!(metrics.unavailable, 0);
        assert_eq!(metrics.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_clock_stepping_back_keeps_entry_fresh() {
        let (cache, clock) = cache_with_clock();
        cache.get_price("Bitcoin").await;

        clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        assert_eq!(cache.get_price("Bitcoin").await.source, PriceSource::Fresh);
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let (cache, _clock) = cache_with_clock();
        cache.get_price("Bitcoin").await;
        cache.get_price("Bitcoin").await;
        cache.get_price("Bitcoin").await;

        let metrics = cache.metrics();
        assert_eq!(metrics.refreshes, 1);
        assert_eq!(metrics.fresh_hits, 2);
        assert_eq!(metrics.tokens, 1);
        assert!((metrics.hit_rate - 2.0 / 3.0).abs() < 1e-9);

        cache.get_price("Dogecoin").await;
        let metrics = cache.metrics();
        assert_eq!(metrics.unsupported, 1);
        assert!((metrics.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
