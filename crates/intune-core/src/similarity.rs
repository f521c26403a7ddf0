//! Pairwise taste similarity.
//!
//! Each category (genres, artists, tracks) contributes its Jaccard index,
//! combined with fixed weights and rounded half away from zero to two
//! decimals. An empty union contributes 0, so empty profiles score 0.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ARTIST_WEIGHT, GENRE_WEIGHT, SCORE_DECIMALS, TRACK_WEIGHT, WEIGHT_SUM_TOLERANCE,
};
use crate::taste::{TasteProfile, Track};

/// Affinity in [0, 1], two decimals.
pub type SimilarityScore = f64;

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight for {0} must be a finite non-negative number")]
    Invalid(&'static str),
    #[error("weights must sum to 1.0, got {0}")]
    BadSum(f64),
}

/// Per-category weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub genre: f64,
    pub artist: f64,
    pub track: f64,
}

impl SimilarityWeights {
    pub const DEFAULT: Self = Self {
        genre: GENRE_WEIGHT,
        artist: ARTIST_WEIGHT,
        track: TRACK_WEIGHT,
    };

    pub fn new(genre: f64, artist: f64, track: f64) -> Result<Self, WeightsError> {
        for (name, w) in [("genre", genre), ("artist", artist), ("track", track)] {
            if !w.is_finite() || w < 0.0 {
                return Err(WeightsError::Invalid(name));
            }
        }
        let sum = genre + artist + track;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::BadSum(sum));
        }
        Ok(Self {
            genre,
            artist,
            track,
        })
    }

    /// Re-check a deserialized weight set.
    pub fn validated(self) -> Result<Self, WeightsError> {
        Self::new(self.genre, self.artist, self.track)
    }

    pub fn score(&self, a: &TasteProfile, b: &TasteProfile) -> SimilarityScore {
        self.overlap(a, b).score
    }

    pub fn overlap(&self, a: &TasteProfile, b: &TasteProfile) -> Overlap {
        let common_genres = common(a.genres(), b.genres());
        let common_artists = common(a.artists(), b.artists());
        let common_tracks = common(a.tracks(), b.tracks());

        let genre_ratio = jaccard(common_genres.len(), a.genres().len(), b.genres().len());
        let artist_ratio = jaccard(common_artists.len(), a.artists().len(), b.artists().len());
        let track_ratio = jaccard(common_tracks.len(), a.tracks().len(), b.tracks().len());

        let raw = self.genre * genre_ratio + self.artist * artist_ratio + self.track * track_ratio;

        Overlap {
            score: round_score(raw),
            genre_ratio,
            artist_ratio,
            track_ratio,
            common_genres,
            common_artists,
            common_tracks,
        }
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Score breakdown between two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub score: SimilarityScore,
    pub genre_ratio: f64,
    pub artist_ratio: f64,
    pub track_ratio: f64,
    pub common_genres: Vec<String>,
    pub common_artists: Vec<String>,
    pub common_tracks: Vec<Track>,
}

/// Score two profiles with the default weights.
pub fn score(a: &TasteProfile, b: &TasteProfile) -> SimilarityScore {
    SimilarityWeights::DEFAULT.score(a, b)
}

/// Full breakdown with the default weights.
pub fn overlap(a: &TasteProfile, b: &TasteProfile) -> Overlap {
    SimilarityWeights::DEFAULT.overlap(a, b)
}

fn common<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> Vec<T> {
    a.intersection(b).cloned().collect()
}

fn jaccard(intersection: usize, len_a: usize, len_b: usize) -> f64 {
    let union = len_a + len_b - intersection;
    intersection as f64 / union.max(1) as f64
}

fn round_score(raw: f64) -> SimilarityScore {
    let factor = 10f64.powi(SCORE_DECIMALS);
    ((raw * factor).round() / factor).clamp(0.0, 1.0)
}
