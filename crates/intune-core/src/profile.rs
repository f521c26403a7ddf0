//! Registration payloads and partial updates for users and songs.
//!
//! Updates are explicit sets of optional fields. Every present field is
//! validated before any is written, so a rejected update leaves the record
//! exactly as it was. For optional text fields an empty string clears the
//! value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    MAX_EMAIL_CHARS, MAX_GENRE_CHARS, MAX_HANDLE_CHARS, MAX_SONG_FIELD_CHARS, MAX_URL_CHARS,
    MAX_USERNAME_CHARS, RATING_RANGE,
};
use crate::model::{Song, UserRecord};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("'{0}' is not a valid email address")]
    Email(String),
    #[error("rating {0} is outside 1 to 5")]
    Rating(f64),
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Blank(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}

fn optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

fn check_email(value: &str) -> Result<String, ValidationError> {
    let value = required("email", value, MAX_EMAIL_CHARS)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(value),
        _ => Err(ValidationError::Email(value)),
    }
}

fn check_rating(value: f64) -> Result<f64, ValidationError> {
    if RATING_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::Rating(value))
    }
}

fn tag_list(
    field: &'static str,
    values: &[String],
    max: usize,
) -> Result<Vec<String>, ValidationError> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| required(field, v, max))
        .collect()
}

/// Registration payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub instagram_handle: Option<String>,
    pub twitter_handle: Option<String>,
    pub spotify_handle: Option<String>,
    pub bio: Option<String>,
    pub top_genres: Vec<String>,
    pub favorite_artists: Vec<String>,
}

impl NewUser {
    /// Trimmed, checked copy.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            username: required("username", &self.username, MAX_USERNAME_CHARS)?,
            email: check_email(&self.email)?,
            instagram_handle: optional(
                "instagram_handle",
                self.instagram_handle.as_deref(),
                MAX_HANDLE_CHARS,
            )?,
            twitter_handle: optional(
                "twitter_handle",
                self.twitter_handle.as_deref(),
                MAX_HANDLE_CHARS,
            )?,
            spotify_handle: optional(
                "spotify_handle",
                self.spotify_handle.as_deref(),
                MAX_HANDLE_CHARS,
            )?,
            bio: self.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()).map(String::from),
            top_genres: tag_list("top_genres", &self.top_genres, MAX_GENRE_CHARS)?,
            favorite_artists: tag_list(
                "favorite_artists",
                &self.favorite_artists,
                MAX_SONG_FIELD_CHARS,
            )?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub twitter_handle: Option<String>,
    pub spotify_handle: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub top_genres: Option<Vec<String>>,
    pub favorite_artists: Option<Vec<String>>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, user: &mut UserRecord) -> Result<(), ValidationError> {
        let username = self
            .username
            .as_deref()
            .map(|v| required("username", v, MAX_USERNAME_CHARS))
            .transpose()?;
        let email = self.email.as_deref().map(check_email).transpose()?;
        let instagram = self
            .instagram_handle
            .as_deref()
            .map(|v| optional("instagram_handle", Some(v), MAX_HANDLE_CHARS))
            .transpose()?;
        let twitter = self
            .twitter_handle
            .as_deref()
            .map(|v| optional("twitter_handle", Some(v), MAX_HANDLE_CHARS))
            .transpose()?;
        let spotify = self
            .spotify_handle
            .as_deref()
            .map(|v| optional("spotify_handle", Some(v), MAX_HANDLE_CHARS))
            .transpose()?;
        let picture = self
            .profile_picture_url
            .as_deref()
            .map(|v| optional("profile_picture_url", Some(v), MAX_URL_CHARS))
            .transpose()?;
        let genres = self
            .top_genres
            .as_deref()
            .map(|v| tag_list("top_genres", v, MAX_GENRE_CHARS))
            .transpose()?;
        let artists = self
            .favorite_artists
            .as_deref()
            .map(|v| tag_list("favorite_artists", v, MAX_SONG_FIELD_CHARS))
            .transpose()?;

        if let Some(v) = username {
            user.username = v;
        }
        if let Some(v) = email {
            user.email = v;
        }
        if let Some(v) = instagram {
            user.instagram_handle = v;
        }
        if let Some(v) = twitter {
            user.twitter_handle = v;
        }
        if let Some(v) = spotify {
            user.spotify_handle = v;
        }
        if let Some(bio) = &self.bio {
            let bio = bio.trim();
            user.bio = (!bio.is_empty()).then(|| bio.to_string());
        }
        if let Some(v) = picture {
            user.profile_picture_url = v;
        }
        if let Some(v) = genres {
            user.top_genres = v;
        }
        if let Some(v) = artists {
            user.favorite_artists = v;
        }
        Ok(())
    }
}

/// Payload for logging a song.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub spotify_id: Option<String>,
    pub user_rating: Option<f64>,
    pub is_favorite: bool,
}

impl NewSong {
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", &self.title, MAX_SONG_FIELD_CHARS)?,
            artist: required("artist", &self.artist, MAX_SONG_FIELD_CHARS)?,
            album: optional("album", self.album.as_deref(), MAX_SONG_FIELD_CHARS)?,
            genre: optional("genre", self.genre.as_deref(), MAX_GENRE_CHARS)?,
            spotify_id: optional("spotify_id", self.spotify_id.as_deref(), MAX_HANDLE_CHARS)?,
            user_rating: self.user_rating.map(check_rating).transpose()?,
            is_favorite: self.is_favorite,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub user_rating: Option<f64>,
    pub is_favorite: Option<bool>,
}

impl SongUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, song: &mut Song) -> Result<(), ValidationError> {
        let title = self
            .title
            .as_deref()
            .map(|v| required("title", v, MAX_SONG_FIELD_CHARS))
            .transpose()?;
        let artist = self
            .artist
            .as_deref()
            .map(|v| required("artist", v, MAX_SONG_FIELD_CHARS))
            .transpose()?;
        let album = self
            .album
            .as_deref()
            .map(|v| optional("album", Some(v), MAX_SONG_FIELD_CHARS))
            .transpose()?;
        let genre = self
            .genre
            .as_deref()
            .map(|v| optional("genre", Some(v), MAX_GENRE_CHARS))
            .transpose()?;
        let user_rating = self.user_rating.map(check_rating).transpose()?;

        if let Some(v) = title {
            song.title = v;
        }
        if let Some(v) = artist {
            song.artist = v;
        }
        if let Some(v) = album {
            song.album = v;
        }
        if let Some(v) = genre {
            song.genre = v;
        }
        if let Some(v) = user_rating {
            song.user_rating = Some(v);
        }
        if let Some(v) = self.is_favorite {
            song.is_favorite = v;
        }
        Ok(())
    }
}
