//! Cache key construction.
//!
//! Keys are the cache's identity contract: same dataset, same key, across
//! restarts and across processes sharing one cache database. Formats here
//! are load-bearing; changing one silently orphans persisted rows.

use crate::types::{EntryId, EventId};

pub const REFERENCE_DATA: &str = "reference-data";
pub const FIXTURES: &str = "fixtures";

pub fn league_standings(league_id: u32) -> String {
    format!("league-standings-{league_id}")
}

pub fn member_picks(entry: EntryId, event: EventId) -> String {
    format!("member-picks-{entry}-{event}")
}

pub fn live_stats(event: EventId) -> String {
    format!("live-stats-{event}")
}
