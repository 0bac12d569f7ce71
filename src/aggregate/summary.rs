use std::collections::{HashMap, HashSet};

use crate::aggregate::diffs::differentials;
use crate::types::{
    CaptainSummary, EntryId, MemberRecord, MemberSummary, PicksRecord, PlayerId, ReferenceTable,
};

/// Combine standings, picks and reference data into per-member summaries,
/// preserving standings order.
///
/// Members whose picks fetch failed still appear, just without captain or
/// differential information. Ids are resolved to display names here; a
/// player missing from the reference table shows as "?" rather than
/// suppressing the row.
pub fn member_summaries(
    members: &[MemberRecord],
    picks_by_member: &HashMap<EntryId, PicksRecord>,
    baseline: &HashSet<PlayerId>,
    reference: &ReferenceTable,
    max_diffs: usize,
) -> Vec<MemberSummary> {
    members
        .iter()
        .map(|member| {
            let Some(record) = picks_by_member.get(&member.entry) else {
                return MemberSummary {
                    member: member.clone(),
                    captain: None,
                    differentials: Vec::new(),
                };
            };

            let rival_ids = record.player_ids();
            let diff_names = differentials(baseline, &rival_ids, max_diffs)
                .into_iter()
                .map(|id| reference.player_name(id).unwrap_or("?").to_string())
                .collect();

            let captain = record.captain().and_then(|pick| {
                let info = reference.players.get(&pick.element)?;
                Some(CaptainSummary {
                    player: pick.element,
                    name: info.web_name.clone(),
                    points: info.event_points * i32::from(pick.multiplier),
                })
            });

            MemberSummary { member: member.clone(), captain, differentials: diff_names }
        })
        .collect()
}
