use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type EntryId = u32;
pub type PlayerId = u32;
pub type TeamId = u32;
pub type EventId = u32;

// ---------------------------------------------------------------------------
// Reference data (players, teams, current gameweek)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub web_name: String,
    pub team: TeamId,
    pub status: PlayerStatus,
    pub form: f64,
    pub expected_goals: f64,
    pub expected_assists: f64,
    pub total_points: i32,
    pub event_points: i32,
    /// Upstream price unit: tenths of a million.
    pub now_cost: u32,
}

impl PlayerInfo {
    pub fn price_m(&self) -> f64 {
        f64::from(self.now_cost) / 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Available,
    Doubtful,
    Injured,
    Suspended,
    Unavailable,
    NotInSquad,
    Unknown,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlayerStatus::Available => "available",
            PlayerStatus::Doubtful => "doubtful",
            PlayerStatus::Injured => "injured",
            PlayerStatus::Suspended => "suspended",
            PlayerStatus::Unavailable => "unavailable",
            PlayerStatus::NotInSquad => "not_in_squad",
            PlayerStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
}

/// Decoded `bootstrap-static`: everything else is interpreted against this.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    pub players: HashMap<PlayerId, PlayerInfo>,
    pub teams: HashMap<TeamId, TeamInfo>,
    pub current_event: Option<EventId>,
}

impl ReferenceTable {
    pub fn player_name(&self, id: PlayerId) -> Option<&str> {
        self.players.get(&id).map(|p| p.web_name.as_str())
    }

    pub fn team_short(&self, id: TeamId) -> Option<&str> {
        self.teams.get(&id).map(|t| t.short_name.as_str())
    }

    /// Pre-season payloads mark no event as current; fall back to GW1.
    pub fn current_event_or_first(&self) -> EventId {
        self.current_event.unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// League standings & member picks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MemberRecord {
    pub entry: EntryId,
    pub player_name: String,
    pub entry_name: String,
    pub rank: u32,
    pub last_rank: u32,
    pub total: i32,
    pub event_total: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pick {
    pub element: PlayerId,
    pub is_captain: bool,
    pub multiplier: u8,
}

/// One manager's squad for one gameweek.
#[derive(Debug, Clone, Serialize)]
pub struct PicksRecord {
    pub entry: EntryId,
    pub event: EventId,
    pub picks: Vec<Pick>,
    /// Transfers made this gameweek, from `entry_history.event_transfers`.
    pub transfers_made: u32,
}

impl PicksRecord {
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.picks.iter().map(|p| p.element).collect()
    }

    pub fn captain(&self) -> Option<&Pick> {
        self.picks.iter().find(|p| p.is_captain)
    }
}

// ---------------------------------------------------------------------------
// Live gameweek stats & fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LivePlayerStat {
    pub player: PlayerId,
    pub minutes: u32,
    pub bps: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fixture {
    pub event: Option<EventId>,
    pub team_h: TeamId,
    pub team_a: TeamId,
    pub team_h_difficulty: u8,
    pub team_a_difficulty: u8,
    pub kickoff_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived views published after each poll cycle
// ---------------------------------------------------------------------------

/// One row of the ownership consensus board.
///
/// `effective_ownership_pct` counts captaincy twice: a player picked by all
/// sampled managers and captained by all of them reads 200%.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipRow {
    pub player: PlayerId,
    pub count: u32,
    pub captain_count: u32,
    pub effective_ownership_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BonusProjection {
    pub player: PlayerId,
    pub bps: i32,
    pub projected_bonus: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptainSummary {
    pub player: PlayerId,
    pub name: String,
    /// Captain's event points with the pick multiplier applied.
    pub points: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub member: MemberRecord,
    pub captain: Option<CaptainSummary>,
    /// Names of the rival's first few picks absent from the baseline squad.
    pub differentials: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureRow {
    pub event: Option<EventId>,
    pub home: String,
    pub away: String,
    pub home_difficulty: u8,
    pub away_difficulty: u8,
    pub kickoff_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferAlert {
    pub entry: EntryId,
    pub manager: String,
    pub previous: u32,
    pub current: u32,
    pub observed_at_ms: u64,
}

/// Outcome counts for one batch of member picks fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub requested: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Everything one poll cycle produced. The API serves the latest one.
#[derive(Debug, Clone, Serialize)]
pub struct LeagueSnapshot {
    pub generation: u64,
    pub polled_at_ms: u64,
    pub event: EventId,
    pub league_name: String,
    pub summaries: Vec<MemberSummary>,
    pub consensus: Vec<OwnershipRow>,
    pub bonus: Vec<BonusProjection>,
    pub fixtures: Vec<FixtureRow>,
    pub batch: BatchStats,
}

// ---------------------------------------------------------------------------
// Channel message types
// ---------------------------------------------------------------------------

/// Control messages for the poller.
#[derive(Debug)]
pub enum PollControl {
    /// Start a fresh cycle now instead of waiting for the next tick.
    RefreshNow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_converts_from_tenths() {
        let player = PlayerInfo {
            id: 7,
            web_name: "Salah".to_string(),
            team: 12,
            status: PlayerStatus::Available,
            form: 8.2,
            expected_goals: 0.61,
            expected_assists: 0.24,
            total_points: 211,
            event_points: 12,
            now_cost: 131,
        };
        assert!((player.price_m() - 13.1).abs() < 1e-9);
    }

    #[test]
    fn current_event_falls_back_to_first() {
        let table = ReferenceTable::default();
        assert_eq!(table.current_event_or_first(), 1);

        let table = ReferenceTable {
            current_event: Some(24),
            ..Default::default()
        };
        assert_eq!(table.current_event_or_first(), 24);
    }

    #[test]
    fn captain_lookup_finds_flagged_pick() {
        let record = PicksRecord {
            entry: 1,
            event: 3,
            picks: vec![
                Pick { element: 10, is_captain: false, multiplier: 1 },
                Pick { element: 20, is_captain: true, multiplier: 2 },
            ],
            transfers_made: 0,
        };
        assert_eq!(record.captain().map(|p| p.element), Some(20));
        assert_eq!(record.player_ids(), vec![10, 20]);
    }
}
