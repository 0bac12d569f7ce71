use std::collections::HashMap;

use crate::types::{EntryId, OwnershipRow, PicksRecord, PlayerId};

/// Build the ownership consensus board from the sampled managers' squads.
///
/// Effective ownership counts a captaincy as a second pick:
/// `(count + captain_count) / managers * 100`. The denominator is the number
/// of members present in `picks_by_member`, so managers whose fetch failed
/// dilute nothing.
///
/// Rows are ordered by effective weight descending; equal weights tie-break
/// on ascending player id, so the board is deterministic for a given input
/// no matter what order the map iterates in.
pub fn consensus(
    picks_by_member: &HashMap<EntryId, PicksRecord>,
    top_n: usize,
) -> Vec<OwnershipRow> {
    let considered = picks_by_member.len();
    if considered == 0 {
        return Vec::new();
    }

    let mut tallies: HashMap<PlayerId, (u32, u32)> = HashMap::new();
    for record in picks_by_member.values() {
        for pick in &record.picks {
            let tally = tallies.entry(pick.element).or_default();
            tally.0 += 1;
            if pick.is_captain {
                tally.1 += 1;
            }
        }
    }

    let mut rows: Vec<OwnershipRow> = tallies
        .into_iter()
        .map(|(player, (count, captain_count))| OwnershipRow {
            player,
            count,
            captain_count,
            effective_ownership_pct: f64::from(count + captain_count) / considered as f64 * 100.0,
        })
        .collect();

    // Integer weight first, then id. Comparing the f64 percentages would
    // reopen the door to rounding-order ties.
    rows.sort_by(|a, b| {
        let wa = a.count + a.captain_count;
        let wb = b.count + b.captain_count;
        wb.cmp(&wa).then_with(|| a.player.cmp(&b.player))
    });
    rows.truncate(top_n);
    rows
}
