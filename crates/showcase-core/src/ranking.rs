//! Deterministic ranking of performance tallies.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use showcase_state::{ContestantId, PerformanceId, RankedEntry};

/// Scores gathered for one performance before ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTally {
    pub performance_id: PerformanceId,
    pub contestant_id: ContestantId,
    pub submitted_at: DateTime<Utc>,
    pub judge_score: f64,
    pub audience_score: f64,
    pub final_score: f64,
}

/// Ordering used for standings: `final_score` descending, then
/// `submitted_at` ascending, then performance id ascending.
///
/// Scores use IEEE total ordering so the comparison is total even for NaN.
pub fn standings_order(a: &PerformanceTally, b: &PerformanceTally) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        .then_with(|| a.performance_id.cmp(&b.performance_id))
}

/// Sort tallies into standings and assign ranks `1..=n`.
pub fn rank_tallies(mut tallies: Vec<PerformanceTally>) -> Vec<RankedEntry> {
    tallies.sort_by(standings_order);
    tallies
        .into_iter()
        .enumerate()
        .map(|(idx, t)| RankedEntry {
            rank: idx as u32 + 1,
            contestant_id: t.contestant_id,
            performance_id: t.performance_id,
            final_score: t.final_score,
            judge_score: t.judge_score,
            audience_score: t.audience_score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tally(id: &str, final_score: f64, minute: u32) -> PerformanceTally {
        PerformanceTally {
            performance_id: id.into(),
            contestant_id: format!("c-{id}").into(),
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 20, minute, 0).unwrap(),
            judge_score: final_score,
            audience_score: 0.0,
            final_score,
        }
    }

    fn order(entries: &[RankedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.performance_id.as_str()).collect()
    }

    #[test]
    fn higher_final_score_ranks_first() {
        let ranked = rank_tallies(vec![tally("p2", 12.0, 0), tally("p1", 17.0, 5)]);
        assert_eq!(order(&ranked), ["p1", "p2"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn ties_break_on_earlier_submission() {
        let ranked = rank_tallies(vec![tally("a", 5.0, 30), tally("b", 5.0, 10)]);
        assert_eq!(order(&ranked), ["b", "a"]);
    }

    #[test]
    fn full_ties_break_on_performance_id() {
        let ranked = rank_tallies(vec![
            tally("p3", 0.0, 0),
            tally("p1", 0.0, 0),
            tally("p2", 0.0, 0),
        ]);
        assert_eq!(order(&ranked), ["p1", "p2", "p3"]);
        let ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = rank_tallies(vec![tally("x", 3.0, 1), tally("y", 3.0, 1), tally("z", 9.0, 2)]);
        let b = rank_tallies(vec![tally("z", 9.0, 2), tally("y", 3.0, 1), tally("x", 3.0, 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_gives_empty_standings() {
        assert!(rank_tallies(Vec::new()).is_empty());
    }
}
