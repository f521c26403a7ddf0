//! Plain records exchanged with the collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::taste::{TasteProfile, Track};
use crate::time::Timestamp;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Store-assigned user identifier.
    UserId
);
id_type!(
    /// Store-assigned song identifier.
    SongId
);
id_type!(
    /// Store-assigned connection identifier.
    ConnectionId
);

/// Lifetime counters kept on a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    LikesReceived,
    ConnectionsMade,
}

impl Counter {
    /// Column name in the users table.
    pub fn column(self) -> &'static str {
        match self {
            Counter::LikesReceived => "likes_received",
            Counter::ConnectionsMade => "connections_made",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub instagram_handle: Option<String>,
    pub twitter_handle: Option<String>,
    pub spotify_handle: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub top_genres: Vec<String>,
    pub favorite_artists: Vec<String>,
    pub likes_received: u32,
    pub connections_made: u32,
    pub created_at: Timestamp,
}

impl UserRecord {
    pub fn counter(&self, counter: Counter) -> u32 {
        match counter {
            Counter::LikesReceived => self.likes_received,
            Counter::ConnectionsMade => self.connections_made,
        }
    }

    /// Build this user's taste profile from their logged songs.
    pub fn taste_profile(&self, songs: &[Song]) -> TasteProfile {
        TasteProfile::new(
            &self.top_genres,
            &self.favorite_artists,
            songs.iter().map(|s| (s.title.as_str(), s.artist.as_str())),
        )
    }
}

/// A song logged by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub user_id: UserId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub spotify_id: Option<String>,
    pub user_rating: Option<f64>,
    pub is_favorite: bool,
    pub created_at: Timestamp,
}

impl Song {
    pub fn track(&self) -> Option<Track> {
        Track::new(&self.title, &self.artist)
    }
}

/// Short song reference attached to recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: SongId,
    pub title: String,
    pub artist: String,
}

impl From<&Song> for TrackSummary {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist.clone(),
        }
    }
}
