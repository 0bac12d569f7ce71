use std::time::Duration;

use crate::error::{AppError, Result};

pub const PROXY_URL: &str = "http://127.0.0.1:8888/.netlify/functions/fpl-proxy";
pub const LEAGUE_ID: u32 = 101_712;

/// Every upstream request is abandoned after this long.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Channel capacity for internal message routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// How many transfer alerts the in-memory log retains for the API.
pub const ALERT_LOG_CAPACITY: usize = 256;

/// Ownership consensus rows kept in the published snapshot.
pub const CONSENSUS_TOP_N: usize = 10;

/// Bonus projection rows kept in the published snapshot (highest BPS first).
pub const BONUS_BOARD_LEN: usize = 10;

/// Upcoming fixtures kept in the published snapshot.
pub const FIXTURE_TICKER_LEN: usize = 10;

/// Differential picks reported per rival.
pub const DIFFS_PER_MEMBER: usize = 2;

/// Hard ceiling on concurrent picks fetches. The upstream rate-limits hard;
/// going wider than this just trades one failure mode for another.
pub const MAX_BATCH_CONCURRENCY: usize = 8;

/// Scout queries shorter than this return nothing.
pub const SCOUT_MIN_QUERY_CHARS: usize = 3;

/// Default freshness window per dataset, in seconds.
pub mod ttl_defaults {
    pub const REFERENCE_SECS: u64 = 86_400;
    pub const STANDINGS_SECS: u64 = 300;
    pub const PICKS_SECS: u64 = 60;
    pub const LIVE_SECS: u64 = 60;
    pub const FIXTURES_SECS: u64 = 3_600;
}

/// Freshness windows for the five cached datasets.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub reference: Duration,
    pub standings: Duration,
    pub picks: Duration,
    pub live: Duration,
    pub fixtures: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            reference: Duration::from_secs(ttl_defaults::REFERENCE_SECS),
            standings: Duration::from_secs(ttl_defaults::STANDINGS_SECS),
            picks: Duration::from_secs(ttl_defaults::PICKS_SECS),
            live: Duration::from_secs(ttl_defaults::LIVE_SECS),
            fixtures: Duration::from_secs(ttl_defaults::FIXTURES_SECS),
        }
    }
}

impl TtlPolicy {
    fn from_env() -> Self {
        Self {
            reference: env_secs("TTL_REFERENCE_SECS", ttl_defaults::REFERENCE_SECS),
            standings: env_secs("TTL_STANDINGS_SECS", ttl_defaults::STANDINGS_SECS),
            picks: env_secs("TTL_PICKS_SECS", ttl_defaults::PICKS_SECS),
            live: env_secs("TTL_LIVE_SECS", ttl_defaults::LIVE_SECS),
            fixtures: env_secs("TTL_FIXTURES_SECS", ttl_defaults::FIXTURES_SECS),
        }
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Clamps the requested picks fan-out into the supported range.
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_BATCH_CONCURRENCY)
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the FPL proxy (FPL_PROXY_URL).
    pub proxy_url: String,
    /// Classic league to track (FPL_LEAGUE_ID).
    pub league_id: u32,
    /// Entry whose squad is the differential baseline (FPL_SELF_ENTRY).
    /// When unset, the league leader's squad is used instead.
    pub self_entry: Option<u32>,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between poll cycles (POLL_INTERVAL_SECS).
    pub poll_interval_secs: u64,
    /// Concurrent picks fetches per batch (BATCH_CONCURRENCY, clamped 1..=8).
    pub batch_concurrency: usize,
    /// How many top-ranked managers feed the ownership consensus (EO_SAMPLE_SIZE).
    pub eo_sample_size: usize,
    /// How many top-ranked managers the transfer watcher follows (WATCH_TOP_N).
    pub watch_top_n: usize,
    pub ttl: TtlPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            proxy_url: std::env::var("FPL_PROXY_URL").unwrap_or_else(|_| PROXY_URL.to_string()),
            league_id: std::env::var("FPL_LEAGUE_ID")
                .unwrap_or_else(|_| LEAGUE_ID.to_string())
                .parse::<u32>()
                .map_err(|_| AppError::Config("FPL_LEAGUE_ID must be a league id".to_string()))?,
            self_entry: match std::env::var("FPL_SELF_ENTRY") {
                Ok(raw) => Some(raw.parse::<u32>().map_err(|_| {
                    AppError::Config("FPL_SELF_ENTRY must be an entry id".to_string())
                })?),
                Err(_) => None,
            },
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "warroom.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .unwrap_or(300)
                .max(1),
            batch_concurrency: clamp_concurrency(
                std::env::var("BATCH_CONCURRENCY")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse::<usize>()
                    .unwrap_or(4),
            ),
            eo_sample_size: std::env::var("EO_SAMPLE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<usize>()
                .unwrap_or(10),
            watch_top_n: std::env::var("WATCH_TOP_N")
                .unwrap_or_else(|_| "3".to_string())
                .parse::<usize>()
                .unwrap_or(3),
            ttl: TtlPolicy::from_env(),
        })
    }
}
