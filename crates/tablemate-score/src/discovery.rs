use tablemate_types::models::CandidateProfile;

use crate::{BASE_SCORE, ScoreBreakdown, Scorer, clamp_score, shared_tags};

const FLEXIBLE: &str = "flexible";

/// Ranks smart-match candidates. Richer signal set than the pairwise
/// formula and explains itself: each earned bonus pushes a reason string,
/// and the top 3 (in computation order) are returned.
pub struct DiscoveryScorer;

impl Scorer for DiscoveryScorer {
    fn score(&self, a: &CandidateProfile, b: &CandidateProfile) -> ScoreBreakdown {
        let mut score = BASE_SCORE;
        let mut reasons: Vec<String> = Vec::new();

        // Dietary overlap: 5 per shared tag, at most 3 tags counted.
        let tags = shared_tags(&a.profile.dietary_tags, &b.profile.dietary_tags);
        if !tags.is_empty() {
            let counted = &tags[..tags.len().min(3)];
            score += 5 * counted.len() as u32;
            reasons.push(format!("You both enjoy {}", counted.join(", ")));
        }

        // Conversation style: exact match beats flexibility.
        let pref_a = &a.profile.conversation_preference;
        let pref_b = &b.profile.conversation_preference;
        if !pref_a.is_empty() && pref_a == pref_b {
            score += 10;
            reasons.push("You share the same conversation style".to_string());
        } else if pref_a == FLEXIBLE || pref_b == FLEXIBLE {
            score += 5;
            reasons.push("Flexible conversation styles".to_string());
        }

        // Shared dining history: 10 per restaurant, capped at 20.
        let shared_spots: Vec<&str> = a
            .recent_restaurants
            .iter()
            .filter(|r| b.recent_restaurants.iter().any(|o| o.id == r.id))
            .map(|r| r.name.as_str())
            .collect();
        if !shared_spots.is_empty() {
            score += (10 * shared_spots.len() as u32).min(20);
            let named = &shared_spots[..shared_spots.len().min(2)];
            reasons.push(format!("You've both dined at {}", named.join(" and ")));
        }

        // A different line of work makes for better table talk.
        if let (Some(occ_a), Some(occ_b)) = (&a.occupation, &b.occupation) {
            if occ_a != occ_b {
                score += 5;
                reasons.push("Different professional backgrounds".to_string());
            }
        }

        if a.photo_verified && b.photo_verified {
            score += 5;
            reasons.push("Both photo verified".to_string());
        }

        if a.social_verified && b.social_verified {
            score += 5;
            reasons.push("Both socially verified".to_string());
        }

        reasons.truncate(3);

        ScoreBreakdown {
            score: clamp_score(score),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemate_types::models::{ProfileSlice, RestaurantRef};
    use uuid::Uuid;

    fn candidate(pref: &str, tags: &[&str]) -> CandidateProfile {
        CandidateProfile {
            profile: ProfileSlice {
                user_id: Uuid::new_v4(),
                conversation_preference: pref.into(),
                dietary_tags: tags.iter().map(|t| t.to_string()).collect(),
            },
            username: "diner".into(),
            occupation: None,
            photo_verified: false,
            social_verified: false,
            recent_restaurants: Vec::new(),
        }
    }

    fn spot(name: &str) -> RestaurantRef {
        RestaurantRef {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    #[test]
    fn blank_candidates_score_base_with_no_reasons() {
        let out = DiscoveryScorer.score(&candidate("", &[]), &candidate("", &[]));
        assert_eq!(out.score, 50);
        assert!(out.reasons.is_empty());
    }

    #[test]
    fn dietary_overlap_caps_at_three_tags() {
        let tags = ["vegan", "thai", "sushi", "bbq"];
        let out = DiscoveryScorer.score(&candidate("", &tags), &candidate("", &tags));
        assert_eq!(out.score, 65);
        assert_eq!(out.reasons[0], "You both enjoy vegan, thai, sushi");
    }

    #[test]
    fn identical_style_beats_flexible() {
        let out = DiscoveryScorer.score(
            &candidate("flexible", &[]),
            &candidate("flexible", &[]),
        );
        // identical (even when identical happens to be "flexible") earns 10
        assert_eq!(out.score, 60);
    }

    #[test]
    fn one_flexible_side_earns_five() {
        let out = DiscoveryScorer.score(
            &candidate("flexible", &[]),
            &candidate("deep talks", &[]),
        );
        assert_eq!(out.score, 55);
        assert_eq!(out.reasons, vec!["Flexible conversation styles".to_string()]);
    }

    #[test]
    fn shared_restaurants_cap_at_twenty_and_name_two() {
        let spots: Vec<RestaurantRef> = vec![spot("Noma"), spot("Osteria"), spot("Quince")];
        let mut a = candidate("", &[]);
        let mut b = candidate("", &[]);
        a.recent_restaurants = spots.clone();
        b.recent_restaurants = spots;

        let out = DiscoveryScorer.score(&a, &b);
        assert_eq!(out.score, 70);
        assert_eq!(out.reasons[0], "You've both dined at Noma and Osteria");
    }

    #[test]
    fn verification_needs_both_sides() {
        let mut a = candidate("", &[]);
        let mut b = candidate("", &[]);
        a.photo_verified = true;
        let out = DiscoveryScorer.score(&a, &b);
        assert_eq!(out.score, 50);

        b.photo_verified = true;
        let out = DiscoveryScorer.score(&a, &b);
        assert_eq!(out.score, 55);
    }

    #[test]
    fn occupation_bonus_requires_a_difference() {
        let mut a = candidate("", &[]);
        let mut b = candidate("", &[]);
        a.occupation = Some("chef".into());
        b.occupation = Some("chef".into());
        assert_eq!(DiscoveryScorer.score(&a, &b).score, 50);

        b.occupation = Some("pilot".into());
        assert_eq!(DiscoveryScorer.score(&a, &b).score, 55);
    }

    #[test]
    fn reasons_are_capped_at_three_in_order() {
        let mut a = candidate("foodie banter", &["vegan"]);
        let mut b = candidate("foodie banter", &["vegan"]);
        let shared = spot("Noma");
        a.recent_restaurants = vec![shared.clone()];
        b.recent_restaurants = vec![shared];
        a.occupation = Some("chef".into());
        b.occupation = Some("pilot".into());
        a.photo_verified = true;
        b.photo_verified = true;

        let out = DiscoveryScorer.score(&a, &b);
        // 50 + 5 + 10 + 10 + 5 + 5 = 85, but only the first three reasons survive
        assert_eq!(out.score, 85);
        assert_eq!(out.reasons.len(), 3);
        assert_eq!(out.reasons[0], "You both enjoy vegan");
        assert!(out.reasons[1].contains("conversation style"));
        assert!(out.reasons[2].contains("Noma"));
    }

    #[test]
    fn strategies_disagree_by_design() {
        let a = candidate("deep talks", &["vegan", "thai"]);
        let b = candidate("deep talks", &["vegan", "thai"]);
        let pairwise = crate::PairwiseScorer.score(&a, &b);
        let discovery = DiscoveryScorer.score(&a, &b);
        // 90 vs 70 on the same inputs
        assert_eq!(pairwise.score, 90);
        assert_eq!(discovery.score, 70);
    }
}
