use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::latency::FetchLatency;
use crate::cache::store::CacheStore;
use crate::error::FetchError;
use crate::proxy::ProxyClient;

/// Cache-first access to upstream datasets.
///
/// Every read goes through [`fetch_with_cache`](Self::fetch_with_cache):
/// fresh cache entries short-circuit the network entirely, successful fetches
/// refill the cache, and failed fetches never touch it. On failure the caller
/// learns whether an expired entry is still around to fall back on.
pub struct CachedFetcher {
    store: Arc<CacheStore>,
    proxy: ProxyClient,
    latency: Arc<FetchLatency>,
}

impl CachedFetcher {
    pub fn new(store: Arc<CacheStore>, proxy: ProxyClient, latency: Arc<FetchLatency>) -> Self {
        Self { store, proxy, latency }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Return the payload for `key`, going upstream only when the cached
    /// entry is missing or expired.
    pub async fn fetch_with_cache(
        &self,
        key: &str,
        path: &str,
        ttl: Duration,
    ) -> std::result::Result<Value, FetchError> {
        if let Some(entry) = self.store.get(key) {
            debug!(key, "cache hit");
            return Ok(entry.payload);
        }

        let started = Instant::now();
        match self.proxy.get_json(path).await {
            Ok(payload) => {
                self.latency.record(started.elapsed());
                debug!(key, elapsed_ms = started.elapsed().as_millis() as u64, "cache fill");
                self.store.put(key, payload.clone(), ttl);
                Ok(payload)
            }
            Err(cause) => {
                warn!(key, %cause, "upstream fetch failed");
                match self.store.get_stale(key) {
                    Some(entry) => Err(FetchError::Stale {
                        key: key.to_string(),
                        payload: entry.payload,
                        cause,
                    }),
                    None => Err(FetchError::Unavailable { key: key.to_string(), cause }),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
