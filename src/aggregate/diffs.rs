use std::collections::HashSet;

use crate::types::PlayerId;

/// Players in a rival's squad that the baseline squad does not own, in the
/// rival's own pick order, capped at `max_results`.
///
/// Rival order is the signal here: FPL squads list the starters by position
/// before the bench, so the first differentials are the ones actually
/// expected to play.
pub fn differentials(
    baseline: &HashSet<PlayerId>,
    rival_picks: &[PlayerId],
    max_results: usize,
) -> Vec<PlayerId> {
    rival_picks
        .iter()
        .copied()
        .filter(|id| !baseline.contains(id))
        .take(max_results)
        .collect()
}
