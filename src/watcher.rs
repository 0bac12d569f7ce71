use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::types::{EntryId, MemberRecord, PicksRecord, TransferAlert};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Per-member transfer-count state machine.
///
/// Each member's count is either unseen or seen-with-a-value. The first
/// observation only establishes the baseline; after that, an observation
/// strictly greater than the stored value fires an alert. Every observation,
/// alerting or not, becomes the new stored value, so a count that decreases
/// (entry swapped, gameweek rolled over) re-baselines silently instead of
/// alerting forever.
pub struct TransferWatcher {
    last_seen: DashMap<EntryId, u32>,
}

impl TransferWatcher {
    pub fn new() -> Self {
        Self { last_seen: DashMap::new() }
    }

    /// Record one observation. Returns `Some((previous, current))` when the
    /// count rose above a previously seen value.
    pub fn observe(&self, entry: EntryId, transfers: u32) -> Option<(u32, u32)> {
        let previous = self.last_seen.insert(entry, transfers);
        match previous {
            Some(prev) if transfers > prev => Some((prev, transfers)),
            _ => None,
        }
    }

    /// Observe the top `limit` members of the standings against their fetched
    /// picks. Members whose picks are absent this cycle are skipped entirely;
    /// a failed fetch is not an observation of zero.
    pub fn observe_all(
        &self,
        members: &[MemberRecord],
        picks_by_member: &HashMap<EntryId, PicksRecord>,
        limit: usize,
    ) -> Vec<TransferAlert> {
        let observed_at_ms = now_ms();
        members
            .iter()
            .take(limit)
            .filter_map(|member| {
                let record = picks_by_member.get(&member.entry)?;
                let (previous, current) = self.observe(member.entry, record.transfers_made)?;
                Some(TransferAlert {
                    entry: member.entry,
                    manager: member.player_name.clone(),
                    previous,
                    current,
                    observed_at_ms,
                })
            })
            .collect()
    }

    /// Forget every baseline. Next observations start from unseen again.
    pub fn reset(&self) {
        self.last_seen.clear();
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}

impl Default for TransferWatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// AlertLog
// ---------------------------------------------------------------------------

/// Bounded in-memory log of fired alerts, newest last. The API reads it;
/// the alert consumer task writes it.
pub struct AlertLog {
    inner: Mutex<VecDeque<TransferAlert>>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    pub fn push(&self, alert: TransferAlert) {
        if let Ok(mut log) = self.inner.lock() {
            if log.len() == self.capacity {
                log.pop_front();
            }
            log.push_back(alert);
        }
    }

    /// Most recent alerts, newest first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<TransferAlert> {
        match self.inner.lock() {
            Ok(log) => log.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
