//! Decoders for the upstream JSON payloads.
//!
//! Each decoder takes the raw `serde_json::Value` the cached fetcher returned
//! and produces the typed shape the rest of the crate works with. Rows that
//! don't carry the fields we need are skipped rather than failing the whole
//! payload; the upstream occasionally ships partial records mid-gameweek.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{
    EntryId, EventId, Fixture, LivePlayerStat, MemberRecord, Pick, PicksRecord, PlayerId,
    PlayerInfo, PlayerStatus, ReferenceTable, TeamInfo,
};

/// Numbers in upstream payloads arrive as either JSON numbers or decimal
/// strings (`"form": "5.2"`), depending on the field and the season.
fn num_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

fn num_u32(v: &Value) -> Option<u32> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
}

pub fn parse_status_str(s: &str) -> PlayerStatus {
    match s {
        "a" => PlayerStatus::Available,
        "d" => PlayerStatus::Doubtful,
        "i" => PlayerStatus::Injured,
        "s" => PlayerStatus::Suspended,
        "u" => PlayerStatus::Unavailable,
        "n" => PlayerStatus::NotInSquad,
        _ => PlayerStatus::Unknown,
    }
}

// ---------------------------------------------------------------------------
// bootstrap-static
// ---------------------------------------------------------------------------

/// Decode `bootstrap-static` into the reference table.
///
/// Walks the raw value instead of deserializing a struct: the payload is
/// large, most of it is irrelevant, and several numeric fields are
/// stringly-typed.
pub fn decode_reference(v: &Value) -> ReferenceTable {
    let mut table = ReferenceTable::default();

    if let Some(events) = v.get("events").and_then(|e| e.as_array()) {
        table.current_event = events
            .iter()
            .find(|e| e.get("is_current").and_then(|c| c.as_bool()).unwrap_or(false))
            .and_then(|e| e.get("id"))
            .and_then(num_u32);
    }

    if let Some(teams) = v.get("teams").and_then(|t| t.as_array()) {
        for team in teams {
            let Some(id) = team.get("id").and_then(num_u32) else { continue };
            let name = team.get("name").and_then(|n| n.as_str()).unwrap_or("").to_string();
            let short_name = team
                .get("short_name")
                .and_then(|n| n.as_str())
                .unwrap_or("")
                .to_string();
            table.teams.insert(id, TeamInfo { id, name, short_name });
        }
    }

    if let Some(elements) = v.get("elements").and_then(|e| e.as_array()) {
        for el in elements {
            let Some(player) = decode_player(el) else { continue };
            table.players.insert(player.id, player);
        }
    }

    table
}

fn decode_player(el: &Value) -> Option<PlayerInfo> {
    let id = el.get("id").and_then(num_u32)?;
    let web_name = el.get("web_name").and_then(|n| n.as_str())?.to_string();
    let team = el.get("team").and_then(num_u32)?;
    let status = el
        .get("status")
        .and_then(|s| s.as_str())
        .map(parse_status_str)
        .unwrap_or(PlayerStatus::Unknown);

    Some(PlayerInfo {
        id,
        web_name,
        team,
        status,
        form: el.get("form").and_then(num_f64).unwrap_or(0.0),
        expected_goals: el.get("expected_goals").and_then(num_f64).unwrap_or(0.0),
        expected_assists: el.get("expected_assists").and_then(num_f64).unwrap_or(0.0),
        total_points: el.get("total_points").and_then(|p| p.as_i64()).unwrap_or(0) as i32,
        event_points: el.get("event_points").and_then(|p| p.as_i64()).unwrap_or(0) as i32,
        now_cost: el.get("now_cost").and_then(num_u32).unwrap_or(0),
    })
}

// ---------------------------------------------------------------------------
// leagues-classic/{id}/standings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawStandingsPayload {
    league: Option<RawLeague>,
    standings: Option<RawStandings>,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStandings {
    results: Option<Vec<RawMember>>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    entry: Option<EntryId>,
    player_name: Option<String>,
    entry_name: Option<String>,
    rank: Option<u32>,
    last_rank: Option<u32>,
    total: Option<i32>,
    event_total: Option<i32>,
}

/// Decode league standings into `(league_name, members)`, preserving the
/// upstream rank order. Returns None only when the payload has no standings
/// block at all.
pub fn decode_standings(v: &Value) -> Option<(String, Vec<MemberRecord>)> {
    let raw: RawStandingsPayload = serde_json::from_value(v.clone()).ok()?;
    let results = raw.standings?.results.unwrap_or_default();

    let name = raw.league.and_then(|l| l.name).unwrap_or_default();
    let members = results
        .into_iter()
        .filter_map(|m| {
            Some(MemberRecord {
                entry: m.entry?,
                player_name: m.player_name.unwrap_or_default(),
                entry_name: m.entry_name.unwrap_or_default(),
                rank: m.rank.unwrap_or(0),
                last_rank: m.last_rank.unwrap_or(0),
                total: m.total.unwrap_or(0),
                event_total: m.event_total.unwrap_or(0),
            })
        })
        .collect();

    Some((name, members))
}

// ---------------------------------------------------------------------------
// entry/{entry}/event/{event}/picks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPicksPayload {
    entry_history: Option<RawEntryHistory>,
    picks: Option<Vec<RawPick>>,
}

#[derive(Debug, Deserialize)]
struct RawEntryHistory {
    event_transfers: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawPick {
    element: Option<PlayerId>,
    is_captain: Option<bool>,
    multiplier: Option<u8>,
}

/// Decode one manager's picks. Returns None when the payload carries no
/// picks array, which is what the upstream answers for entries that have not
/// entered the gameweek.
pub fn decode_picks(v: &Value, entry: EntryId, event: EventId) -> Option<PicksRecord> {
    let raw: RawPicksPayload = serde_json::from_value(v.clone()).ok()?;
    let picks = raw
        .picks?
        .into_iter()
        .filter_map(|p| {
            Some(Pick {
                element: p.element?,
                is_captain: p.is_captain.unwrap_or(false),
                multiplier: p.multiplier.unwrap_or(1),
            })
        })
        .collect();

    Some(PicksRecord {
        entry,
        event,
        picks,
        transfers_made: raw.entry_history.and_then(|h| h.event_transfers).unwrap_or(0),
    })
}

// ---------------------------------------------------------------------------
// event/{event}/live
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawLivePayload {
    elements: Option<Vec<RawLiveElement>>,
}

#[derive(Debug, Deserialize)]
struct RawLiveElement {
    id: Option<PlayerId>,
    stats: Option<RawLiveStats>,
}

#[derive(Debug, Deserialize)]
struct RawLiveStats {
    minutes: Option<u32>,
    bps: Option<i32>,
}

pub fn decode_live(v: &Value) -> Vec<LivePlayerStat> {
    let raw: RawLivePayload = match serde_json::from_value(v.clone()) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    raw.elements
        .unwrap_or_default()
        .into_iter()
        .filter_map(|el| {
            let stats = el.stats.unwrap_or(RawLiveStats { minutes: None, bps: None });
            Some(LivePlayerStat {
                player: el.id?,
                minutes: stats.minutes.unwrap_or(0),
                bps: stats.bps.unwrap_or(0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// fixtures?future=1
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawFixture {
    event: Option<EventId>,
    team_h: Option<u32>,
    team_a: Option<u32>,
    team_h_difficulty: Option<u8>,
    team_a_difficulty: Option<u8>,
    kickoff_time: Option<String>,
}

/// Decode the upcoming fixture list, preserving upstream order (soonest
/// kickoff first).
pub fn decode_fixtures(v: &Value) -> Vec<Fixture> {
    let raw: Vec<RawFixture> = match serde_json::from_value(v.clone()) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    raw.into_iter()
        .filter_map(|f| {
            Some(Fixture {
                event: f.event,
                team_h: f.team_h?,
                team_a: f.team_a?,
                team_h_difficulty: f.team_h_difficulty.unwrap_or(0),
                team_a_difficulty: f.team_a_difficulty.unwrap_or(0),
                kickoff_time: f.kickoff_time,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
