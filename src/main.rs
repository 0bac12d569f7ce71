mod aggregate;
mod api;
mod batch;
mod cache;
mod config;
mod error;
mod poller;
mod proxy;
mod scout;
mod types;
mod upstream;
mod watcher;

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::FetchLatency;
use crate::api::routes::{router, ApiState};
use crate::cache::{CachePersister, CacheStore, CachedFetcher};
use crate::config::{Config, ALERT_LOG_CAPACITY, CHANNEL_CAPACITY};
use crate::error::Result;
use crate::poller::{PollCycle, Poller, SharedReference, SharedSnapshot};
use crate::proxy::ProxyClient;
use crate::scout::CompareSlots;
use crate::types::{PollControl, ReferenceTable, TransferAlert};
use crate::watcher::{AlertLog, TransferWatcher};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Cache: hydrate from disk, then hand writes to the persister task ---
    let (persist_tx, persist_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let store = CacheStore::load(&pool, persist_tx).await?;
    let persister = CachePersister::new(pool.clone(), persist_rx);
    tokio::spawn(async move { persister.run().await });

    // --- Upstream access ---
    let latency = Arc::new(FetchLatency::new());
    let proxy = ProxyClient::new(cfg.proxy_url.clone())?;
    let fetcher =
        Arc::new(CachedFetcher::new(Arc::clone(&store), proxy, Arc::clone(&latency)));
    info!(
        "Tracking league {} through {} (poll every {}s, sampling top {} squads)",
        cfg.league_id, cfg.proxy_url, cfg.poll_interval_secs, cfg.eo_sample_size,
    );

    // --- Baseline notice ---
    match cfg.self_entry {
        Some(entry) => info!("Differential baseline: entry {entry}"),
        None => warn!(
            "FPL_SELF_ENTRY not set; the league leader's squad becomes the differential baseline (example: FPL_SELF_ENTRY=1234567)"
        ),
    }

    // --- Shared state ---
    let snapshot: SharedSnapshot = Arc::new(RwLock::new(None));
    let reference: SharedReference = Arc::new(RwLock::new(Arc::new(ReferenceTable::default())));
    let watcher = Arc::new(TransferWatcher::new());
    let health = Arc::new(HealthState::new());
    let alerts = Arc::new(AlertLog::new(ALERT_LOG_CAPACITY));

    // --- Channels ---
    let (alert_tx, alert_rx) = mpsc::channel::<TransferAlert>(CHANNEL_CAPACITY);
    let (refresh_tx, control_rx) = mpsc::channel::<PollControl>(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // Alert consumer: telemetry logger + the bounded log the API serves
    let alert_log = Arc::clone(&alerts);
    tokio::spawn(async move { alert_consumer(alert_rx, alert_log).await });

    // Poller (the immediate first tick doubles as the startup fetch)
    let cycle = PollCycle::new(
        cfg.clone(),
        Arc::clone(&fetcher),
        Arc::clone(&watcher),
        Arc::clone(&snapshot),
        Arc::clone(&reference),
        Arc::clone(&health),
        alert_tx,
    );
    let poller = Poller::new(cycle, control_rx);
    tokio::spawn(async move { poller.run().await });

    // HTTP API server
    let api_state = ApiState {
        snapshot,
        reference,
        alerts,
        health,
        latency,
        cache: store,
        watcher,
        slots: Arc::new(Mutex::new(CompareSlots::new())),
        refresh_tx,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Consumes transfer alerts from the poller: logs each one and appends it to
/// the bounded log behind /alerts/recent.
async fn alert_consumer(mut rx: mpsc::Receiver<TransferAlert>, log: Arc<AlertLog>) {
    while let Some(alert) = rx.recv().await {
        info!(
            event = "TRANSFER_ALERT",
            entry = alert.entry,
            manager = %alert.manager,
            previous = alert.previous,
            current = alert.current,
            "RIVAL WATCH | {} made a transfer ({} -> {} this gameweek)",
            alert.manager, alert.previous, alert.current,
        );
        log.push(alert);
    }
}
