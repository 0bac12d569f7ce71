use tokio::sync::mpsc;
use tracing::error;

use crate::error::Result;

/// Write commands the in-memory store enqueues for the persister.
#[derive(Debug)]
pub enum PersistCmd {
    Put {
        key: String,
        payload: serde_json::Value,
        expires_at: u64,
    },
    Clear,
}

/// Receives cache writes from the store and persists them to SQLite.
/// Runs as a dedicated background task; fetch paths never wait on the disk.
pub struct CachePersister {
    pool: sqlx::SqlitePool,
    cmd_rx: mpsc::Receiver<PersistCmd>,
}

impl CachePersister {
    pub fn new(pool: sqlx::SqlitePool, cmd_rx: mpsc::Receiver<PersistCmd>) -> Self {
        Self { pool, cmd_rx }
    }

    pub async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            if let Err(e) = apply(&self.pool, &cmd).await {
                error!("cache persist error: {e}");
            }
        }
    }
}

async fn apply(pool: &sqlx::SqlitePool, cmd: &PersistCmd) -> Result<()> {
    match cmd {
        PersistCmd::Put { key, payload, expires_at } => {
            sqlx::query(
                r#"
                INSERT INTO cache_entries (key, payload, expires_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    payload = excluded.payload,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(key)
            .bind(payload.to_string())
            .bind(*expires_at as i64)
            .execute(pool)
            .await?;
        }
        PersistCmd::Clear => {
            sqlx::query("DELETE FROM cache_entries").execute(pool).await?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheStore;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Single-connection pool: each `sqlite::memory:` connection is its own
    /// database, so tests must not fan out.
    async fn memory_pool() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn put(key: &str, payload: serde_json::Value, expires_at: u64) -> PersistCmd {
        PersistCmd::Put { key: key.to_string(), payload, expires_at }
    }

    #[tokio::test]
    async fn persisted_entries_survive_reload() {
        let pool = memory_pool().await;
        let far_future = crate::cache::store::now_ms() + 60_000;

        apply(&pool, &put("fixtures", json!([{"event": 9}]), far_future)).await.unwrap();
        apply(&pool, &put("reference-data", json!({"teams": []}), far_future)).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let store = CacheStore::load(&pool, tx).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("fixtures").unwrap().payload[0]["event"], 9);
    }

    #[tokio::test]
    async fn expired_rows_not_hydrated() {
        let pool = memory_pool().await;
        let now = crate::cache::store::now_ms();

        apply(&pool, &put("live-stats-4", json!({}), now.saturating_sub(1_000))).await.unwrap();
        apply(&pool, &put("fixtures", json!([]), now + 60_000)).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let store = CacheStore::load(&pool, tx).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("fixtures").is_some());
        assert!(store.get_stale("live-stats-4").is_none());
    }

    #[tokio::test]
    async fn put_upserts_on_key() {
        let pool = memory_pool().await;
        let far_future = crate::cache::store::now_ms() + 60_000;

        apply(&pool, &put("fixtures", json!({"v": 1}), far_future)).await.unwrap();
        apply(&pool, &put("fixtures", json!({"v": 2}), far_future + 1)).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let store = CacheStore::load(&pool, tx).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fixtures").unwrap().payload["v"], 2);
    }

    #[tokio::test]
    async fn clear_deletes_all_rows() {
        let pool = memory_pool().await;
        let far_future = crate::cache::store::now_ms() + 60_000;

        apply(&pool, &put("a", json!(1), far_future)).await.unwrap();
        apply(&pool, &put("b", json!(2), far_future)).await.unwrap();
        apply(&pool, &PersistCmd::Clear).await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let store = CacheStore::load(&pool, tx).await.unwrap();
        assert!(store.is_empty());
    }
}
