use crate::types::{Fixture, FixtureRow, ReferenceTable};

/// Resolve the first `limit` upcoming fixtures into display rows, keeping the
/// upstream's soonest-first order. Unknown team ids render as "?" so one bad
/// row can't sink the ticker.
pub fn fixture_ticker(
    fixtures: &[Fixture],
    reference: &ReferenceTable,
    limit: usize,
) -> Vec<FixtureRow> {
    fixtures
        .iter()
        .take(limit)
        .map(|f| FixtureRow {
            event: f.event,
            home: reference.team_short(f.team_h).unwrap_or("?").to_string(),
            away: reference.team_short(f.team_a).unwrap_or("?").to_string(),
            home_difficulty: f.team_h_difficulty,
            away_difficulty: f.team_a_difficulty,
            kickoff_time: f.kickoff_time.clone(),
        })
        .collect()
}
