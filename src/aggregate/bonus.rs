use crate::types::{BonusProjection, LivePlayerStat};

/// Project live bonus points from the live BPS table.
///
/// Players with zero minutes are ignored; the rest are ranked by BPS
/// descending and banded: the top three project 3 bonus points, the next
/// three project 2, everyone below projects 1. Wider than the scoring the
/// upstream eventually applies, but during matches it reads as "in bonus
/// contention" rather than a final answer.
///
/// The sort is stable, so players on equal BPS keep their input order.
pub fn project_bonus(live_stats: &[LivePlayerStat]) -> Vec<BonusProjection> {
    let mut played: Vec<&LivePlayerStat> = live_stats.iter().filter(|s| s.minutes > 0).collect();
    played.sort_by(|a, b| b.bps.cmp(&a.bps));

    played
        .iter()
        .enumerate()
        .map(|(rank, s)| BonusProjection {
            player: s.player,
            bps: s.bps,
            projected_bonus: bonus_for_rank(rank),
        })
        .collect()
}

fn bonus_for_rank(rank: usize) -> u8 {
    match rank {
        0..=2 => 3,
        3..=5 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(player: u32, minutes: u32, bps: i32) -> LivePlayerStat {
        LivePlayerStat { player, minutes, bps }
    }

    #[test]
    fn bands_follow_bps_rank() {
        let stats = vec![
            stat(1, 90, 40),
            stat(2, 90, 38),
            stat(3, 90, 36),
            stat(4, 90, 30),
            stat(5, 90, 28),
            stat(6, 90, 25),
            stat(7, 90, 20),
        ];

        let projections = project_bonus(&stats);
        assert_eq!(projections.len(), 7);
        let bonuses: Vec<u8> = projections.iter().map(|p| p.projected_bonus).collect();
        assert_eq!(bonuses, vec![3, 3, 3, 2, 2, 2, 1]);
        assert_eq!(projections[0].player, 1);
        assert_eq!(projections[6].player, 7);
    }

    #[test]
    fn unused_players_never_project_bonus() {
        let stats = vec![stat(1, 0, 50), stat(2, 12, 4)];

        let projections = project_bonus(&stats);
        assert_eq!(projections.len(), 1);
        assert_eq!(projections[0].player, 2);
        assert_eq!(projections[0].projected_bonus, 3);
    }

    #[test]
    fn equal_bps_keeps_input_order() {
        let stats = vec![stat(9, 45, 20), stat(4, 45, 20), stat(7, 45, 20)];

        let projections = project_bonus(&stats);
        let order: Vec<u32> = projections.iter().map(|p| p.player).collect();
        assert_eq!(order, vec![9, 4, 7]);
    }

    #[test]
    fn projection_reorders_by_bps_not_input() {
        let stats = vec![stat(1, 90, 5), stat(2, 90, 50)];

        let projections = project_bonus(&stats);
        assert_eq!(projections[0].player, 2);
        assert_eq!(projections[0].projected_bonus, 3);
        assert_eq!(projections[1].projected_bonus, 3);
    }

    #[test]
    fn empty_live_table_projects_nothing() {
        assert!(project_bonus(&[]).is_empty());
    }
}
