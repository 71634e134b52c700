use tablemate_types::models::{CandidateProfile, ProfileSlice};

use crate::{BASE_SCORE, ScoreBreakdown, Scorer, clamp_score, shared_tags};

/// Ranks diners at a venue and a user's match list. No reason strings.
pub struct PairwiseScorer;

impl Scorer for PairwiseScorer {
    fn score(&self, a: &CandidateProfile, b: &CandidateProfile) -> ScoreBreakdown {
        ScoreBreakdown {
            score: pairwise_score(&a.profile, &b.profile),
            reasons: Vec::new(),
        }
    }
}

/// Base 50, +20 for an identical non-empty conversation preference, and a
/// dietary-overlap bonus of min(25, 10 + 5 per shared tag) when both tag
/// sets are non-empty and actually intersect.
pub fn pairwise_score(a: &ProfileSlice, b: &ProfileSlice) -> u8 {
    let mut score = BASE_SCORE;

    if !a.conversation_preference.is_empty()
        && a.conversation_preference == b.conversation_preference
    {
        score += 20;
    }

    if !a.dietary_tags.is_empty() && !b.dietary_tags.is_empty() {
        let overlap = shared_tags(&a.dietary_tags, &b.dietary_tags).len() as u32;
        if overlap > 0 {
            score += (10 + 5 * overlap).min(25);
        }
    }

    clamp_score(score)
}
