use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde_json::Value;
use sqlx::Row;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cache::persist::PersistCmd;
use crate::error::Result;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One cached upstream payload with its freshness deadline (unix millis).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub expires_at: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, at_ms: u64) -> bool {
        self.expires_at > at_ms
    }
}

/// In-memory TTL cache keyed by dataset identity.
///
/// Reads are lock-free hot path; writes also enqueue a persistence command so
/// the entry survives a restart. Expired entries are not evicted on read:
/// they stay around as stale-fallback material until overwritten or cleared.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    persist_tx: Option<mpsc::Sender<PersistCmd>>,
}

impl CacheStore {
    /// Memory-only store. Entries die with the process.
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new(), persist_tx: None })
    }

    pub fn with_persistence(persist_tx: mpsc::Sender<PersistCmd>) -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new(), persist_tx: Some(persist_tx) })
    }

    /// Build a persisted store, hydrating unexpired rows from the database.
    /// Rows already past their deadline are left behind; they would only be
    /// stale-fallback material and the fallback window ends at restart.
    pub async fn load(
        pool: &sqlx::SqlitePool,
        persist_tx: mpsc::Sender<PersistCmd>,
    ) -> Result<Arc<Self>> {
        let store = Self::with_persistence(persist_tx);

        let rows = sqlx::query("SELECT key, payload, expires_at FROM cache_entries WHERE expires_at > ?1")
            .bind(now_ms() as i64)
            .fetch_all(pool)
            .await?;

        for row in rows {
            let key: String = row.try_get("key")?;
            let payload_text: String = row.try_get("payload")?;
            let expires_at: i64 = row.try_get("expires_at")?;
            match serde_json::from_str(&payload_text) {
                Ok(payload) => {
                    store.entries.insert(key, CacheEntry { payload, expires_at: expires_at as u64 });
                }
                Err(e) => warn!("discarding unreadable cache row `{key}`: {e}"),
            }
        }

        info!("cache hydrated: {} entries", store.entries.len());
        Ok(store)
    }

    /// Fresh entry for `key`, or None when absent or expired.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(now_ms()) {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Entry for `key` regardless of freshness. Fallback path for callers
    /// that prefer expired data over none.
    pub fn get_stale(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Store a payload with a freshness window of `ttl` from now.
    ///
    /// Callers must only put payloads that already passed decoding; an error
    /// body written here would be served as data for a full TTL.
    pub fn put(&self, key: &str, payload: Value, ttl: Duration) {
        let expires_at = now_ms() + ttl.as_millis() as u64;
        self.entries
            .insert(key.to_string(), CacheEntry { payload: payload.clone(), expires_at });

        if let Some(tx) = &self.persist_tx {
            let cmd = PersistCmd::Put { key: key.to_string(), payload, expires_at };
            if let Err(e) = tx.try_send(cmd) {
                warn!("cache persist queue full; dropping write for `{key}`: {e}");
            }
        }
    }

    /// Drop every entry, memory and database both.
    pub fn clear(&self) {
        self.entries.clear();
        if let Some(tx) = &self.persist_tx {
            if let Err(e) = tx.try_send(PersistCmd::Clear) {
                warn!("cache persist queue full; dropping clear: {e}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
