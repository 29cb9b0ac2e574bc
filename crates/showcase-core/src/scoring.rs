//! Judge and audience score aggregation.
//!
//! A performance's judge score is the mean `overall` mark across its judge
//! scores, its audience score is its raw vote count, and a [`ScoringPolicy`]
//! combines the two into the final score used for ranking.

use showcase_state::{ScoreCriteria, ScoreRecord};

use crate::error::{Result, ShowcaseError};

/// Lowest mark a judge may give.
pub const MIN_MARK: f64 = 0.0;
/// Highest mark a judge may give.
pub const MAX_MARK: f64 = 10.0;

/// Mean of the `overall` marks, or `0.0` when there are no scores.
pub fn judge_score(scores: &[ScoreRecord]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores.iter().map(|s| s.criteria.overall).sum();
    total / scores.len() as f64
}

/// Raw vote count as a score. Not normalized.
pub fn audience_score(vote_count: u64) -> f64 {
    vote_count as f64
}

/// Reject criteria with a mark outside `0.0..=10.0` or a non-finite mark.
pub fn validate_criteria(criteria: &ScoreCriteria) -> Result<()> {
    for (name, value) in criteria.marks() {
        if !value.is_finite() || !(MIN_MARK..=MAX_MARK).contains(&value) {
            return Err(ShowcaseError::InvalidScore {
                criterion: name.to_string(),
                value,
            });
        }
    }
    Ok(())
}

/// Combines judge and audience scores into a final score.
pub trait ScoringPolicy: Send + Sync {
    fn final_score(&self, judge_score: f64, audience_score: f64) -> f64;

    /// Short label recorded in logs.
    fn name(&self) -> &'static str;
}

/// `final = judge + audience`.
///
/// Audience counts are unbounded while judge scores top out at 10, so once a
/// round draws more than a handful of votes the audience dominates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveScoring;

impl ScoringPolicy for AdditiveScoring {
    fn final_score(&self, judge_score: f64, audience_score: f64) -> f64 {
        judge_score + audience_score
    }

    fn name(&self) -> &'static str {
        "additive"
    }
}
