use serde::Serialize;

use crate::config::SCOUT_MIN_QUERY_CHARS;
use crate::types::{PlayerId, PlayerInfo, PlayerStatus, ReferenceTable};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Case-insensitive substring search over player display names.
///
/// Queries shorter than the minimum return nothing. Of several matches the
/// one with the lowest player id wins, so repeated identical queries against
/// the same reference table always land on the same player.
pub fn search<'a>(reference: &'a ReferenceTable, query: &str) -> Option<&'a PlayerInfo> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < SCOUT_MIN_QUERY_CHARS {
        return None;
    }

    let mut ids: Vec<PlayerId> = reference.players.keys().copied().collect();
    ids.sort_unstable();
    ids.into_iter()
        .filter_map(|id| reference.players.get(&id))
        .find(|p| p.web_name.to_lowercase().contains(&needle))
}

/// Flat display shape for one player, ready for the API.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerCard {
    pub player: PlayerId,
    pub name: String,
    pub team: String,
    pub status: PlayerStatus,
    pub price_m: f64,
    pub form: f64,
    pub expected_goals: f64,
    pub expected_assists: f64,
    pub total_points: i32,
}

pub fn card(reference: &ReferenceTable, info: &PlayerInfo) -> PlayerCard {
    PlayerCard {
        player: info.id,
        name: info.web_name.clone(),
        team: reference.team_short(info.team).unwrap_or("?").to_string(),
        status: info.status,
        price_m: info.price_m(),
        form: info.form,
        expected_goals: info.expected_goals,
        expected_assists: info.expected_assists,
        total_points: info.total_points,
    }
}

// ---------------------------------------------------------------------------
// Two-slot comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricWinner {
    A,
    B,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub metric: &'static str,
    pub a: f64,
    pub b: f64,
    pub winner: Option<MetricWinner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub a: PlayerCard,
    pub b: PlayerCard,
    pub rows: Vec<MetricRow>,
}

fn metric_row(metric: &'static str, a: f64, b: f64) -> MetricRow {
    let winner = if a > b {
        Some(MetricWinner::A)
    } else if b > a {
        Some(MetricWinner::B)
    } else {
        None
    };
    MetricRow { metric, a, b, winner }
}

pub fn compare(reference: &ReferenceTable, a: &PlayerInfo, b: &PlayerInfo) -> Comparison {
    let rows = vec![
        // No winner on price: cheaper is not better out of context.
        MetricRow { metric: "price_m", a: a.price_m(), b: b.price_m(), winner: None },
        metric_row("expected_goals", a.expected_goals, b.expected_goals),
        metric_row("expected_assists", a.expected_assists, b.expected_assists),
        metric_row("total_points", f64::from(a.total_points), f64::from(b.total_points)),
    ];
    Comparison { a: card(reference, a), b: card(reference, b), rows }
}

/// Lock-two-then-compare state machine.
///
/// Empty: the first lock stores the player and waits. One player locked: the
/// next lock produces a comparison and resets to empty. Locking the same
/// player twice is legal and compares it with itself.
#[derive(Debug, Default)]
pub struct CompareSlots {
    locked: Option<PlayerId>,
}

#[derive(Debug)]
pub enum LockOutcome {
    Locked(PlayerId),
    Compared(Comparison),
}

impl CompareSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked(&self) -> Option<PlayerId> {
        self.locked
    }

    pub fn reset(&mut self) {
        self.locked = None;
    }

    /// Lock `player` into the free slot. Returns None (state untouched) when
    /// the id is unknown to the reference table.
    pub fn lock(&mut self, reference: &ReferenceTable, player: PlayerId) -> Option<LockOutcome> {
        let info = reference.players.get(&player)?;
        match self.locked.take() {
            Some(first) => match reference.players.get(&first) {
                Some(first_info) => {
                    Some(LockOutcome::Compared(compare(reference, first_info, info)))
                }
                None => {
                    // The earlier pick vanished from a reloaded reference
                    // table; treat this lock as a fresh first slot.
                    self.locked = Some(player);
                    Some(LockOutcome::Locked(player))
                }
            },
            None => {
                self.locked = Some(player);
                Some(LockOutcome::Locked(player))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
