//! Taste profiles: the normalized genre/artist/track view of a user.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a genre, artist or title for comparison.
/// Trims, collapses whitespace runs to one space, lowercases.
/// Returns `None` for blank input.
pub fn normalize(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE_RUN.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

/// A normalized (title, artist) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
}

impl Track {
    /// Both halves must be non-blank after normalization.
    pub fn new(title: &str, artist: &str) -> Option<Self> {
        Some(Self {
            title: normalize(title)?,
            artist: normalize(artist)?,
        })
    }
}

/// Derived view of a user used only for scoring. Sets are ordered so that
/// overlap listings come out sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasteProfile {
    genres: BTreeSet<String>,
    artists: BTreeSet<String>,
    tracks: BTreeSet<Track>,
}

impl TasteProfile {
    pub fn new<'a, G, A, T>(genres: G, artists: A, tracks: T) -> Self
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
        T: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            genres: genres
                .into_iter()
                .filter_map(|g| normalize(g.as_ref()))
                .collect(),
            artists: artists
                .into_iter()
                .filter_map(|a| normalize(a.as_ref()))
                .collect(),
            tracks: tracks
                .into_iter()
                .filter_map(|(title, artist)| Track::new(title, artist))
                .collect(),
        }
    }

    pub fn genres(&self) -> &BTreeSet<String> {
        &self.genres
    }

    pub fn artists(&self) -> &BTreeSet<String> {
        &self.artists
    }

    pub fn tracks(&self) -> &BTreeSet<Track> {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty() && self.artists.is_empty() && self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TRACKS: [(&str, &str); 0] = [];

    #[test]
    fn test_normalize_case_and_spacing() {
        assert_eq!(normalize("  Hip   Hop "), Some("hip hop".to_string()));
        assert_eq!(normalize("R&B"), Some("r&b".to_string()));
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn test_profile_deduplicates_case_variants() {
        let p = TasteProfile::new(["Rock", "rock", "ROCK "], ["Björk", "björk"], NO_TRACKS);
        assert_eq!(p.genres().len(), 1);
        assert_eq!(p.artists().len(), 1);
    }

    #[test]
    fn test_blank_entries_dropped() {
        let p = TasteProfile::new(["", " "], ["\t"], [("", "Someone"), ("Song", " ")]);
        assert!(p.is_empty());
    }

    #[test]
    fn test_track_identity_uses_both_fields() {
        let p = TasteProfile::new(
            Vec::<String>::new(),
            Vec::<String>::new(),
            [("Hurt", "Nine Inch Nails"), ("Hurt", "Johnny Cash"), ("HURT", "johnny cash")],
        );
        assert_eq!(p.tracks().len(), 2);
    }
}
