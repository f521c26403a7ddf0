//! Recommendation ranking over candidate profiles.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;
use crate::model::{TrackSummary, UserId};
use crate::similarity::{SimilarityScore, SimilarityWeights};
use crate::taste::TasteProfile;

/// Page size clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankLimit(usize);

impl RankLimit {
    pub fn new(requested: usize) -> Self {
        Self(requested.clamp(1, MAX_PAGE_SIZE))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for RankLimit {
    fn from(requested: usize) -> Self {
        Self::new(requested)
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub user_id: UserId,
    pub username: String,
    pub profile: TasteProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub username: String,
    pub score: SimilarityScore,
    pub common_genres: Vec<String>,
    pub common_artists: Vec<String>,
    /// Filled by the lifecycle from the candidate's favorites.
    #[serde(default)]
    pub top_tracks: Vec<TrackSummary>,
}

/// Rank `candidates` for `requester`.
///
/// Drops the requester, anyone already connected in either direction
/// (`existing_pairs` holds ordered `(initiator, target)` pairs) and zero
/// scores. Sorted by score descending, then user id ascending.
pub fn rank(
    requester: &Candidate,
    candidates: &[Candidate],
    existing_pairs: &HashSet<(UserId, UserId)>,
    limit: RankLimit,
    weights: &SimilarityWeights,
) -> Vec<Recommendation> {
    let me = requester.user_id;
    let mut ranked: Vec<Recommendation> = candidates
        .iter()
        .filter(|c| c.user_id != me)
        .filter(|c| {
            !existing_pairs.contains(&(me, c.user_id)) && !existing_pairs.contains(&(c.user_id, me))
        })
        .filter_map(|c| {
            let overlap = weights.overlap(&requester.profile, &c.profile);
            (overlap.score > 0.0).then(|| Recommendation {
                user_id: c.user_id,
                username: c.username.clone(),
                score: overlap.score,
                common_genres: overlap.common_genres,
                common_artists: overlap.common_artists,
                top_tracks: Vec::new(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    ranked.truncate(limit.get());
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, genres: &[&str], artists: &[&str]) -> Candidate {
        Candidate {
            user_id: UserId(id),
            username: format!("user{id}"),
            profile: TasteProfile::new(genres, artists, std::iter::empty()),
        }
    }

    fn ids(recs: &[Recommendation]) -> Vec<i64> {
        recs.iter().map(|r| r.user_id.0).collect()
    }

    fn pool() -> (Candidate, Vec<Candidate>) {
        let me = candidate(1, &["pop", "rock"], &["X", "Y"]);
        let others = vec![
            candidate(2, &["pop"], &["X"]),         // 0.35
            candidate(3, &["pop", "rock"], &["X", "Y"]), // 0.70
            candidate(4, &["metal"], &["Z"]),       // 0
            candidate(5, &["rock"], &["Y"]),        // 0.35
            candidate(6, &["pop", "rock"], &["X"]),  // 0.50
        ];
        (me, others)
    }

    #[test]
    fn test_orders_by_score_then_id() {
        let (me, others) = pool();
        let recs = rank(&me, &others, &HashSet::new(), RankLimit::new(10), &SimilarityWeights::DEFAULT);
        assert_eq!(ids(&recs), vec![3, 6, 2, 5]);
        assert_eq!(recs[0].score, 0.7);
        assert_eq!(recs[2].score, recs[3].score);
    }

    #[test]
    fn test_excludes_zero_scores_and_self() {
        let (me, mut others) = pool();
        others.push(me.clone());
        let recs = rank(&me, &others, &HashSet::new(), RankLimit::new(10), &SimilarityWeights::DEFAULT);
        assert!(!ids(&recs).contains(&4));
        assert!(!ids(&recs).contains(&1));
    }

    #[test]
    fn test_excludes_existing_pairs_both_directions() {
        let (me, others) = pool();
        let pairs: HashSet<(UserId, UserId)> =
            [(UserId(1), UserId(3)), (UserId(6), UserId(1))].into_iter().collect();
        let recs = rank(&me, &others, &pairs, RankLimit::new(10), &SimilarityWeights::DEFAULT);
        assert_eq!(ids(&recs), vec![2, 5]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let (me, others) = pool();
        let recs = rank(&me, &others, &HashSet::new(), RankLimit::new(2), &SimilarityWeights::DEFAULT);
        assert_eq!(ids(&recs), vec![3, 6]);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(RankLimit::new(0).get(), 1);
        assert_eq!(RankLimit::new(500).get(), MAX_PAGE_SIZE);
        assert_eq!(RankLimit::from(7).get(), 7);
    }

    #[test]
    fn test_repeatable_for_shuffled_input() {
        let (me, mut others) = pool();
        let first = rank(&me, &others, &HashSet::new(), RankLimit::new(10), &SimilarityWeights::DEFAULT);
        others.reverse();
        let second = rank(&me, &others, &HashSet::new(), RankLimit::new(10), &SimilarityWeights::DEFAULT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_reports_common_sets() {
        let (me, others) = pool();
        let recs = rank(&me, &others, &HashSet::new(), RankLimit::new(1), &SimilarityWeights::DEFAULT);
        assert_eq!(recs[0].common_genres, vec!["pop", "rock"]);
        assert_eq!(recs[0].common_artists, vec!["x", "y"]);
    }
}
