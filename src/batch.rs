use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::cache::{keys, CachedFetcher};
use crate::types::{BatchStats, EntryId, EventId, PicksRecord};
use crate::upstream::decode_picks;

/// Fetch picks for every entry in `entries`, at most `concurrency` requests
/// in flight at once.
///
/// Failures are per-member: an entry whose fetch or decode fails is simply
/// absent from the result map, and the remaining members are unaffected. The
/// map is keyed by entry id, so completion order (which `buffer_unordered`
/// scrambles) never shows in the output.
pub async fn fetch_event_picks(
    fetcher: &CachedFetcher,
    entries: &[EntryId],
    event: EventId,
    ttl: Duration,
    concurrency: usize,
) -> (HashMap<EntryId, PicksRecord>, BatchStats) {
    let concurrency = concurrency.max(1);

    let fetches = entries.iter().copied().map(|entry| async move {
        let key = keys::member_picks(entry, event);
        let path = format!("entry/{entry}/event/{event}/picks");
        match fetcher.fetch_with_cache(&key, &path, ttl).await {
            Ok(payload) => match decode_picks(&payload, entry, event) {
                Some(record) => (entry, Some(record)),
                None => {
                    warn!(entry, event, "picks payload had no picks array");
                    (entry, None)
                }
            },
            Err(e) => {
                debug!(entry, event, "picks fetch failed: {e}");
                (entry, None)
            }
        }
    });

    let mut results = HashMap::with_capacity(entries.len());
    let mut failed = 0usize;
    let mut outcomes = stream::iter(fetches).buffer_unordered(concurrency);
    while let Some((entry, record)) = outcomes.next().await {
        match record {
            Some(record) => {
                results.insert(entry, record);
            }
            None => failed += 1,
        }
    }

    let stats = BatchStats { requested: entries.len(), fetched: results.len(), failed };
    (results, stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::latency::FetchLatency;
    use crate::cache::CacheStore;
    use crate::proxy::ProxyClient;
    use axum::{extract::Query, routing::get, Router};
    use serde_json::json;
    use std::sync::Arc;

    /// Stub that answers picks for any entry except those in `broken`, which
    /// get an upstream error body instead.
    async fn spawn_picks_stub(broken: Vec<EntryId>) -> ProxyClient {
        let router = Router::new().route(
            "/proxy",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let broken = broken.clone();
                async move {
                    let path = params.get("path").cloned().unwrap_or_default();
                    // path shape: entry/{entry}/event/{event}/picks
                    let entry: EntryId = path
                        .split('/')
                        .nth(1)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                    if broken.contains(&entry) {
                        return axum::Json(json!({"error": "upstream returned 429"}));
                    }
                    axum::Json(json!({
                        "entry_history": {"event_transfers": 1},
                        "picks": [
                            {"element": entry * 100, "is_captain": true, "multiplier": 2},
                            {"element": entry * 100 + 1, "is_captain": false, "multiplier": 1}
                        ]
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ProxyClient::new(format!("http://{addr}/proxy")).unwrap()
    }

    fn fetcher(proxy: ProxyClient) -> CachedFetcher {
        CachedFetcher::new(CacheStore::new(), proxy, Arc::new(FetchLatency::new()))
    }

    #[tokio::test]
    async fn one_failure_leaves_other_members_intact() {
        let proxy = spawn_picks_stub(vec![2]).await;
        let fetcher = fetcher(proxy);

        let (picks, stats) =
            fetch_event_picks(&fetcher, &[1, 2, 3], 4, Duration::from_secs(60), 4).await;

        assert_eq!(stats, BatchStats { requested: 3, fetched: 2, failed: 1 });
        assert!(picks.contains_key(&1));
        assert!(!picks.contains_key(&2));
        assert!(picks.contains_key(&3));
        assert_eq!(picks[&3].captain().map(|p| p.element), Some(300));
    }

    #[tokio::test]
    async fn result_is_input_order_independent() {
        let proxy = spawn_picks_stub(vec![]).await;

        let fetcher_a = fetcher(proxy.clone());
        let (picks_a, _) =
            fetch_event_picks(&fetcher_a, &[5, 6, 7, 8], 4, Duration::from_secs(60), 2).await;

        let fetcher_b = fetcher(proxy);
        let (picks_b, _) =
            fetch_event_picks(&fetcher_b, &[8, 7, 6, 5], 4, Duration::from_secs(60), 2).await;

        assert_eq!(picks_a.len(), 4);
        for entry in [5u32, 6, 7, 8] {
            assert_eq!(picks_a[&entry].player_ids(), picks_b[&entry].player_ids());
            assert_eq!(picks_a[&entry].transfers_made, picks_b[&entry].transfers_made);
        }
    }

    #[tokio::test]
    async fn total_failure_yields_empty_map() {
        let proxy = spawn_picks_stub(vec![1, 2, 3]).await;
        let fetcher = fetcher(proxy);

        let (picks, stats) =
            fetch_event_picks(&fetcher, &[1, 2, 3], 4, Duration::from_secs(60), 8).await;

        assert!(picks.is_empty());
        assert_eq!(stats.failed, 3);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let proxy = spawn_picks_stub(vec![]).await;
        let fetcher = fetcher(proxy);

        let (picks, stats) =
            fetch_event_picks(&fetcher, &[], 4, Duration::from_secs(60), 4).await;

        assert!(picks.is_empty());
        assert_eq!(stats, BatchStats::default());
    }

    #[tokio::test]
    async fn serial_and_parallel_agree() {
        let proxy = spawn_picks_stub(vec![11]).await;

        let fetcher_serial = fetcher(proxy.clone());
        let (serial, serial_stats) =
            fetch_event_picks(&fetcher_serial, &[10, 11, 12], 4, Duration::from_secs(60), 1).await;

        let fetcher_wide = fetcher(proxy);
        let (wide, wide_stats) =
            fetch_event_picks(&fetcher_wide, &[10, 11, 12], 4, Duration::from_secs(60), 8).await;

        assert_eq!(serial_stats, wide_stats);
        assert_eq!(serial.len(), wide.len());
        assert_eq!(serial[&10].player_ids(), wide[&10].player_ids());
    }
}
