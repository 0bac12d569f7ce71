use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::health::HealthState;
use crate::api::latency::{FetchLatency, LatencyPercentiles};
use crate::cache::CacheStore;
use crate::error::AppError;
use crate::poller::{SharedReference, SharedSnapshot};
use crate::scout::{self, CompareSlots, Comparison, LockOutcome, PlayerCard};
use crate::types::{
    BatchStats, BonusProjection, FixtureRow, LeagueSnapshot, OwnershipRow, PlayerId, PollControl,
    ReferenceTable, TransferAlert,
};
use crate::watcher::{AlertLog, TransferWatcher};

const DEFAULT_ALERTS_LIMIT: usize = 20;

/// Everything the handlers read or poke. All fields are shared handles; the
/// poller owns the write side of `snapshot` and `reference`.
#[derive(Clone)]
pub struct ApiState {
    pub snapshot: SharedSnapshot,
    pub reference: SharedReference,
    pub alerts: Arc<AlertLog>,
    pub health: Arc<HealthState>,
    pub latency: Arc<FetchLatency>,
    pub cache: Arc<CacheStore>,
    pub watcher: Arc<TransferWatcher>,
    pub slots: Arc<Mutex<CompareSlots>>,
    pub refresh_tx: mpsc::Sender<PollControl>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/league", get(get_league))
        .route("/consensus", get(get_consensus))
        .route("/bonus", get(get_bonus))
        .route("/fixtures", get(get_fixtures))
        .route("/alerts/recent", get(get_recent_alerts))
        .route("/scout/search", get(get_scout_search))
        .route("/scout/lock/:player_id", post(post_scout_lock))
        .route("/refresh", post(post_refresh))
        .route("/cache/clear", post(post_cache_clear))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ScoutQuery {
    pub q: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockResponse {
    Locked { player: PlayerId },
    Compared { comparison: Comparison },
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub queued: bool,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub dropped: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_poll_at_ms: u64,
    pub last_generation: u64,
    pub last_poll_ok: bool,
    pub polls_completed: u64,
    pub polls_failed: u64,
    pub members_fetched: u64,
    pub members_failed: u64,
    pub last_batch: Option<BatchStats>,
    pub cache_entries: usize,
    pub alerts_logged: usize,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub percentiles: Option<LatencyPercentiles>,
}

// ---------------------------------------------------------------------------
// Snapshot access
// ---------------------------------------------------------------------------

fn current_snapshot(state: &ApiState) -> Option<LeagueSnapshot> {
    state.snapshot.read().ok().and_then(|guard| (*guard).clone())
}

fn require_snapshot(state: &ApiState) -> Result<LeagueSnapshot, AppError> {
    current_snapshot(state)
        .ok_or_else(|| AppError::NotFound("no poll cycle has completed yet".to_string()))
}

fn current_reference(state: &ApiState) -> Arc<ReferenceTable> {
    state
        .reference
        .read()
        .map(|guard| Arc::clone(&guard))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_league(State(state): State<ApiState>) -> Result<Json<LeagueSnapshot>, AppError> {
    Ok(Json(require_snapshot(&state)?))
}

async fn get_consensus(
    State(state): State<ApiState>,
) -> Result<Json<Vec<OwnershipRow>>, AppError> {
    Ok(Json(require_snapshot(&state)?.consensus))
}

async fn get_bonus(State(state): State<ApiState>) -> Result<Json<Vec<BonusProjection>>, AppError> {
    Ok(Json(require_snapshot(&state)?.bonus))
}

async fn get_fixtures(State(state): State<ApiState>) -> Result<Json<Vec<FixtureRow>>, AppError> {
    Ok(Json(require_snapshot(&state)?.fixtures))
}

async fn get_recent_alerts(
    State(state): State<ApiState>,
    Query(params): Query<AlertsQuery>,
) -> Json<Vec<TransferAlert>> {
    let limit = params.limit.unwrap_or(DEFAULT_ALERTS_LIMIT);
    Json(state.alerts.recent(limit))
}

async fn get_scout_search(
    State(state): State<ApiState>,
    Query(params): Query<ScoutQuery>,
) -> Result<Json<PlayerCard>, AppError> {
    let reference = current_reference(&state);
    match scout::search(&reference, &params.q) {
        Some(info) => Ok(Json(scout::card(&reference, info))),
        None => Err(AppError::NotFound(format!("no player matching `{}`", params.q))),
    }
}

async fn post_scout_lock(
    State(state): State<ApiState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<LockResponse>, AppError> {
    let reference = current_reference(&state);
    let mut slots = state.slots.lock().unwrap_or_else(PoisonError::into_inner);
    let outcome = slots.lock(&reference, player_id);
    drop(slots);

    match outcome {
        Some(LockOutcome::Locked(player)) => Ok(Json(LockResponse::Locked { player })),
        Some(LockOutcome::Compared(comparison)) => {
            Ok(Json(LockResponse::Compared { comparison }))
        }
        None => Err(AppError::NotFound(format!(
            "player {player_id} is not in the reference table"
        ))),
    }
}

async fn post_refresh(State(state): State<ApiState>) -> Result<Json<RefreshResponse>, AppError> {
    use tokio::sync::mpsc::error::TrySendError;

    match state.refresh_tx.try_send(PollControl::RefreshNow) {
        Ok(()) => Ok(Json(RefreshResponse { queued: true })),
        // A full queue means refreshes are already pending; nothing to add.
        Err(TrySendError::Full(_)) => Ok(Json(RefreshResponse { queued: false })),
        Err(TrySendError::Closed(_)) => {
            Err(AppError::League("poller is not running".to_string()))
        }
    }
}

async fn post_cache_clear(State(state): State<ApiState>) -> Json<ClearResponse> {
    let dropped = state.cache.len();
    state.cache.clear();
    // Clearing is session-end semantics: transfer baselines start over too,
    // so the next cycle re-seeds instead of alerting on counts it knew.
    state.watcher.reset();
    Json(ClearResponse { dropped })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let health = &state.health;
    let status = if health.polls_completed() == 0 && health.polls_failed() == 0 {
        "starting"
    } else if health.last_poll_ok() {
        "ok"
    } else {
        "degraded"
    };
    let last_batch = current_snapshot(&state).map(|s| s.batch);

    Json(HealthResponse {
        status,
        last_poll_at_ms: health.last_poll_at_ms(),
        last_generation: health.last_generation(),
        last_poll_ok: health.last_poll_ok(),
        polls_completed: health.polls_completed(),
        polls_failed: health.polls_failed(),
        members_fetched: health.members_fetched(),
        members_failed: health.members_failed(),
        last_batch,
        cache_entries: state.cache.len(),
        alerts_logged: state.alerts.len(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        samples: state.latency.len(),
        percentiles: state.latency.percentiles(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerInfo, PlayerStatus, TeamInfo};
    use serde_json::Value;
    use std::sync::RwLock;
    use std::time::Duration;

    fn player(id: PlayerId, name: &str, now_cost: u32, total_points: i32) -> PlayerInfo {
        PlayerInfo {
            id,
            web_name: name.to_string(),
            team: 1,
            status: PlayerStatus::Available,
            form: 5.0,
            expected_goals: 0.4,
            expected_assists: 0.2,
            total_points,
            event_points: 0,
            now_cost,
        }
    }

    fn test_reference() -> ReferenceTable {
        let mut table = ReferenceTable::default();
        table.teams.insert(
            1,
            TeamInfo { id: 1, name: "Arsenal".to_string(), short_name: "ARS".to_string() },
        );
        for info in [player(100, "Havertz", 151, 150), player(300, "Saka", 102, 120)] {
            table.players.insert(info.id, info);
        }
        table.current_event = Some(4);
        table
    }

    fn test_snapshot() -> LeagueSnapshot {
        LeagueSnapshot {
            generation: 7,
            polled_at_ms: 1_000,
            event: 4,
            league_name: "Test League".to_string(),
            summaries: Vec::new(),
            consensus: vec![OwnershipRow {
                player: 100,
                count: 3,
                captain_count: 1,
                effective_ownership_pct: 400.0 / 3.0,
            }],
            bonus: Vec::new(),
            fixtures: Vec::new(),
            batch: BatchStats { requested: 3, fetched: 3, failed: 0 },
        }
    }

    fn test_state() -> (ApiState, mpsc::Receiver<PollControl>) {
        let (refresh_tx, refresh_rx) = mpsc::channel(4);
        let state = ApiState {
            snapshot: Arc::new(RwLock::new(None)),
            reference: Arc::new(RwLock::new(Arc::new(test_reference()))),
            alerts: Arc::new(AlertLog::new(16)),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(FetchLatency::new()),
            cache: CacheStore::new(),
            watcher: Arc::new(TransferWatcher::new()),
            slots: Arc::new(Mutex::new(CompareSlots::new())),
            refresh_tx,
        };
        (state, refresh_rx)
    }

    async fn serve(state: ApiState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn league_is_404_until_first_poll_publishes() {
        let (state, _rx) = test_state();
        let base = serve(state.clone()).await;

        let resp = reqwest::get(format!("{base}/league")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("no poll cycle"));

        *state.snapshot.write().unwrap() = Some(test_snapshot());

        let resp = reqwest::get(format!("{base}/league")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["league_name"], "Test League");
        assert_eq!(body["generation"], 7);
    }

    #[tokio::test]
    async fn section_endpoints_serve_snapshot_slices() {
        let (state, _rx) = test_state();
        *state.snapshot.write().unwrap() = Some(test_snapshot());
        let base = serve(state).await;

        let consensus: Value = reqwest::get(format!("{base}/consensus"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(consensus[0]["player"], 100);
        assert_eq!(consensus[0]["count"], 3);

        let bonus = reqwest::get(format!("{base}/bonus")).await.unwrap();
        assert_eq!(bonus.status(), 200);
        let bonus: Value = bonus.json().await.unwrap();
        assert!(bonus.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_alerts_come_newest_first() {
        let (state, _rx) = test_state();
        for i in 0..3u32 {
            state.alerts.push(TransferAlert {
                entry: i,
                manager: format!("m{i}"),
                previous: 0,
                current: i + 1,
                observed_at_ms: u64::from(i),
            });
        }
        let base = serve(state).await;

        let body: Value = reqwest::get(format!("{base}/alerts/recent?limit=2"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let alerts = body.as_array().unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["entry"], 2);
        assert_eq!(alerts[1]["entry"], 1);
    }

    #[tokio::test]
    async fn scout_search_resolves_player_card() {
        let (state, _rx) = test_state();
        let base = serve(state).await;

        let resp = reqwest::get(format!("{base}/scout/search?q=hav")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let card: Value = resp.json().await.unwrap();
        assert_eq!(card["name"], "Havertz");
        assert_eq!(card["team"], "ARS");

        // Short and unmatched queries are both 404s.
        let resp = reqwest::get(format!("{base}/scout/search?q=ha")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let resp = reqwest::get(format!("{base}/scout/search?q=nobody")).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn scout_lock_compares_on_second_player_then_resets() {
        let (state, _rx) = test_state();
        let base = serve(state).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/scout/lock/100"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["outcome"], "locked");
        assert_eq!(body["player"], 100);

        let body: Value = client
            .post(format!("{base}/scout/lock/300"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["outcome"], "compared");
        assert_eq!(body["comparison"]["a"]["player"], 100);
        assert_eq!(body["comparison"]["b"]["player"], 300);

        // Slots reset: the next lock starts a new pair.
        let body: Value = client
            .post(format!("{base}/scout/lock/300"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["outcome"], "locked");

        let resp = client.post(format!("{base}/scout/lock/12345")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn refresh_enqueues_a_poll_control_message() {
        let (state, mut rx) = test_state();
        let base = serve(state).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{base}/refresh"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["queued"], true);
        assert!(matches!(rx.try_recv(), Ok(PollControl::RefreshNow)));
    }

    #[tokio::test]
    async fn cache_clear_drops_entries_and_watcher_baselines() {
        let (state, _rx) = test_state();
        state.cache.put("fixtures", serde_json::json!([]), Duration::from_secs(60));
        state.cache.put("reference-data", serde_json::json!({}), Duration::from_secs(60));
        state.watcher.observe(11, 2);
        let base = serve(state.clone()).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{base}/cache/clear"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["dropped"], 2);
        assert!(state.cache.is_empty());
        assert_eq!(state.watcher.tracked(), 0);
    }

    #[tokio::test]
    async fn health_reflects_poll_lifecycle() {
        let (state, _rx) = test_state();
        let base = serve(state.clone()).await;

        let body: Value =
            reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "starting");
        assert_eq!(body["last_batch"], Value::Null);

        let batch = BatchStats { requested: 10, fetched: 9, failed: 1 };
        state.health.record_published(3, 1_234, &batch);
        *state.snapshot.write().unwrap() = Some(LeagueSnapshot { batch, ..test_snapshot() });

        let body: Value =
            reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["last_generation"], 3);
        assert_eq!(body["polls_completed"], 1);
        assert_eq!(body["last_batch"]["fetched"], 9);

        state.health.record_failed();
        let body: Value =
            reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn latency_percentiles_appear_after_first_sample() {
        let (state, _rx) = test_state();
        let base = serve(state.clone()).await;

        let body: Value = reqwest::get(format!("{base}/stats/latency"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["samples"], 0);
        assert_eq!(body["percentiles"], Value::Null);

        state.latency.record(Duration::from_millis(12));
        let body: Value = reqwest::get(format!("{base}/stats/latency"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["samples"], 1);
        assert!(body["percentiles"]["p50_us"].as_u64().unwrap() > 0);
    }
}
