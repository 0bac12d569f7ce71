use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::aggregate::{consensus, fixture_ticker, member_summaries, project_bonus};
use crate::api::health::HealthState;
use crate::batch::fetch_event_picks;
use crate::cache::{keys, CachedFetcher};
use crate::config::{
    Config, BONUS_BOARD_LEN, CONSENSUS_TOP_N, DIFFS_PER_MEMBER, FIXTURE_TICKER_LEN,
};
use crate::error::{AppError, FetchError, Result};
use crate::types::{
    EntryId, EventId, LeagueSnapshot, MemberRecord, PicksRecord, PlayerId, PollControl,
    ReferenceTable, TransferAlert,
};
use crate::upstream::{
    decode_fixtures, decode_live, decode_picks, decode_reference, decode_standings,
};
use crate::watcher::TransferWatcher;

/// Latest published snapshot. The poller swaps it whole; the API clones it out.
pub type SharedSnapshot = Arc<RwLock<Option<LeagueSnapshot>>>;

/// Latest decoded reference table, swapped in on every published cycle. The
/// scout endpoints resolve searches and comparisons against whatever is
/// current.
pub type SharedReference = Arc<RwLock<Arc<ReferenceTable>>>;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Periodic poll driver.
///
/// Ticks every `poll_interval_secs` (the first tick fires immediately, so
/// startup polls right away) and additionally on every `RefreshNow` control
/// message. Each trigger bumps the shared generation counter and spawns an
/// independent cycle tagged with the new value; a cycle whose tag is stale by
/// publish time only warmed the cache.
pub struct Poller {
    cycle: PollCycle,
    control_rx: mpsc::Receiver<PollControl>,
}

impl Poller {
    pub fn new(cycle: PollCycle, control_rx: mpsc::Receiver<PollControl>) -> Self {
        Self { cycle, control_rx }
    }

    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(self.cycle.cfg.poll_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => self.spawn_cycle("interval"),
                Some(ctrl) = self.control_rx.recv() => match ctrl {
                    PollControl::RefreshNow => {
                        info!("refresh requested; starting a new cycle");
                        self.spawn_cycle("refresh");
                    }
                },
            }
        }
    }

    fn spawn_cycle(&self, trigger: &'static str) {
        let generation = self.cycle.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, trigger, "starting poll cycle");
        let cycle = self.cycle.clone();
        tokio::spawn(async move { cycle.run(generation).await });
    }
}

/// One poll cycle's handles, cloned per trigger so a superseded cycle can run
/// to completion without blocking its successor.
#[derive(Clone)]
pub struct PollCycle {
    cfg: Config,
    fetcher: Arc<CachedFetcher>,
    watcher: Arc<TransferWatcher>,
    snapshot: SharedSnapshot,
    reference: SharedReference,
    health: Arc<HealthState>,
    alert_tx: mpsc::Sender<TransferAlert>,
    generation: Arc<AtomicU64>,
}

impl PollCycle {
    pub fn new(
        cfg: Config,
        fetcher: Arc<CachedFetcher>,
        watcher: Arc<TransferWatcher>,
        snapshot: SharedSnapshot,
        reference: SharedReference,
        health: Arc<HealthState>,
        alert_tx: mpsc::Sender<TransferAlert>,
    ) -> Self {
        Self {
            cfg,
            fetcher,
            watcher,
            snapshot,
            reference,
            health,
            alert_tx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn run(self, generation: u64) {
        match self.execute(generation).await {
            Ok(true) => {}
            Ok(false) => debug!(generation, "poll cycle superseded; results discarded"),
            Err(e) => {
                self.health.record_failed();
                error!(generation, "could not load league data: {e}");
            }
        }
    }

    /// Fetch, aggregate and (when still current) publish. Returns Ok(false)
    /// when a newer generation took over before the publish gate.
    async fn execute(&self, generation: u64) -> Result<bool> {
        let started = Instant::now();

        let raw = self
            .fetch_or_stale(keys::REFERENCE_DATA, "bootstrap-static", self.cfg.ttl.reference)
            .await?;
        let reference = Arc::new(decode_reference(&raw));
        let event = reference.current_event_or_first();

        let standings_key = keys::league_standings(self.cfg.league_id);
        let standings_path = format!("leagues-classic/{}/standings", self.cfg.league_id);
        let raw = self
            .fetch_or_stale(&standings_key, &standings_path, self.cfg.ttl.standings)
            .await?;
        let (league_name, members) = decode_standings(&raw).ok_or_else(|| {
            AppError::League("standings payload has no standings block".to_string())
        })?;

        let sample: Vec<EntryId> =
            members.iter().take(self.cfg.eo_sample_size).map(|m| m.entry).collect();
        let (picks, batch) = fetch_event_picks(
            &self.fetcher,
            &sample,
            event,
            self.cfg.ttl.picks,
            self.cfg.batch_concurrency,
        )
        .await;
        if batch.requested > 0 && batch.fetched == 0 {
            return Err(AppError::League(format!(
                "all {} squad fetches failed for event {event}",
                batch.requested
            )));
        }

        let baseline = self.baseline_squad(&members, &picks, event).await;

        let bonus = match self
            .fetch_or_stale(&keys::live_stats(event), &format!("event/{event}/live"), self.cfg.ttl.live)
            .await
        {
            Ok(raw) => {
                let mut rows = project_bonus(&decode_live(&raw));
                rows.truncate(BONUS_BOARD_LEN);
                rows
            }
            Err(e) => {
                warn!(event, "live stats unavailable, bonus board empty: {e}");
                Vec::new()
            }
        };

        let fixtures = match self
            .fetch_or_stale(keys::FIXTURES, "fixtures?future=1", self.cfg.ttl.fixtures)
            .await
        {
            Ok(raw) => fixture_ticker(&decode_fixtures(&raw), &reference, FIXTURE_TICKER_LEN),
            Err(e) => {
                warn!("fixtures unavailable, ticker empty: {e}");
                Vec::new()
            }
        };

        let sampled = &members[..sample.len()];
        let summaries = member_summaries(sampled, &picks, &baseline, &reference, DIFFS_PER_MEMBER);
        let consensus_rows = consensus(&picks, CONSENSUS_TOP_N);

        // Publish gate. A newer cycle owns the shared state from here on;
        // everything above only warmed the cache, which is harmless.
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(false);
        }

        let alerts = self.watcher.observe_all(&members, &picks, self.cfg.watch_top_n);
        let alert_count = alerts.len();
        for alert in alerts {
            if let Err(e) = self.alert_tx.try_send(alert) {
                warn!("alert channel full; dropping alert: {e}");
            }
        }

        let polled_at_ms = now_ms();
        let snapshot = LeagueSnapshot {
            generation,
            polled_at_ms,
            event,
            league_name,
            summaries,
            consensus: consensus_rows,
            bonus,
            fixtures,
            batch,
        };
        if let Ok(mut current) = self.snapshot.write() {
            *current = Some(snapshot);
        }
        if let Ok(mut current) = self.reference.write() {
            *current = Arc::clone(&reference);
        }
        self.health.record_published(generation, polled_at_ms, &batch);

        let (fetched, requested) = (batch.fetched, batch.requested);
        info!(
            generation,
            event,
            elapsed_ms = started.elapsed().as_millis() as u64,
            fetched,
            failed = batch.failed,
            alerts = alert_count,
            "poll cycle complete: {fetched}/{requested} squads, {alert_count} transfer alerts",
        );

        Ok(true)
    }

    /// Fetch one dataset, falling back to an expired cache entry when the
    /// upstream is down. Only `Unavailable` propagates.
    async fn fetch_or_stale(
        &self,
        key: &str,
        path: &str,
        ttl: Duration,
    ) -> std::result::Result<Value, FetchError> {
        match self.fetcher.fetch_with_cache(key, path, ttl).await {
            Ok(payload) => Ok(payload),
            Err(FetchError::Stale { key, payload, cause }) => {
                warn!(key = %key, %cause, "serving expired cache entry");
                Ok(payload)
            }
            Err(e) => Err(e),
        }
    }

    /// The squad differentials are measured against. The configured self
    /// entry wins; otherwise the league leader stands in. Missing picks give
    /// an empty baseline, which marks every rival pick as a differential.
    async fn baseline_squad(
        &self,
        members: &[MemberRecord],
        picks: &HashMap<EntryId, PicksRecord>,
        event: EventId,
    ) -> HashSet<PlayerId> {
        let Some(entry) = self.cfg.self_entry.or_else(|| members.first().map(|m| m.entry))
        else {
            return HashSet::new();
        };

        if let Some(record) = picks.get(&entry) {
            return record.player_ids().into_iter().collect();
        }

        // A configured self entry usually sits outside the sampled batch.
        let key = keys::member_picks(entry, event);
        let path = format!("entry/{entry}/event/{event}/picks");
        match self.fetcher.fetch_with_cache(&key, &path, self.cfg.ttl.picks).await {
            Ok(payload) => decode_picks(&payload, entry, event)
                .map(|record| record.player_ids().into_iter().collect())
                .unwrap_or_default(),
            Err(e) => {
                warn!(entry, "baseline squad unavailable: {e}");
                HashSet::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
