//! Shared health state for the /health endpoint.
//! Updated by the poller, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::types::BatchStats;

/// Shared poll-cycle metrics. Counters are lifetime totals; the `last_*`
/// fields describe the most recent completed cycle.
#[derive(Default)]
pub struct HealthState {
    /// Unix-millis timestamp of the last published snapshot (0 = none).
    pub last_poll_at_ms: AtomicU64,
    /// Generation of the last published snapshot.
    pub last_generation: AtomicU64,
    /// True while the last finished cycle ended in a published snapshot.
    pub last_poll_ok: AtomicBool,
    pub polls_completed: AtomicU64,
    pub polls_failed: AtomicU64,
    /// Lifetime member picks fetch outcomes across all batches.
    pub members_fetched: AtomicU64,
    pub members_failed: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self, generation: u64, at_ms: u64, batch: &BatchStats) {
        self.last_poll_at_ms.store(at_ms, Ordering::Relaxed);
        self.last_generation.store(generation, Ordering::Relaxed);
        self.last_poll_ok.store(true, Ordering::Relaxed);
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
        self.members_fetched.fetch_add(batch.fetched as u64, Ordering::Relaxed);
        self.members_failed.fetch_add(batch.failed as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.last_poll_ok.store(false, Ordering::Relaxed);
        self.polls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_poll_at_ms(&self) -> u64 {
        self.last_poll_at_ms.load(Ordering::Relaxed)
    }

    pub fn last_generation(&self) -> u64 {
        self.last_generation.load(Ordering::Relaxed)
    }

    pub fn last_poll_ok(&self) -> bool {
        self.last_poll_ok.load(Ordering::Relaxed)
    }

    pub fn polls_completed(&self) -> u64 {
        self.polls_completed.load(Ordering::Relaxed)
    }

    pub fn polls_failed(&self) -> u64 {
        self.polls_failed.load(Ordering::Relaxed)
    }

    pub fn members_fetched(&self) -> u64 {
        self.members_fetched.load(Ordering::Relaxed)
    }

    pub fn members_failed(&self) -> u64 {
        self.members_failed.load(Ordering::Relaxed)
    }
}
