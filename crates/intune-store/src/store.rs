use std::path::Path;

use intune_core::{
    Counter, NewSong, NewUser, RankLimit, Song, SongId, SongRepository, SongUpdate, StoreFault,
    Timestamp, UserId, UserLookup, UserRecord, UserUpdate,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{Result, StoreError, is_foreign_key_violation, is_unique_violation};
use crate::schema;

const USER_COLUMNS: &str = "id, username, email, instagram_handle, twitter_handle, spotify_handle,
     bio, profile_picture_url, top_genres, favorite_artists, likes_received, connections_made,
     created_at";

const SONG_COLUMNS: &str =
    "id, user_id, title, artist, album, genre, spotify_id, user_rating, is_favorite, created_at";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidData(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `work` inside one SQLite transaction, rolling back when it fails.
    /// Every write on this store goes through the same connection, so user
    /// counters bumped inside `work` commit with the connection row.
    pub fn in_transaction<T, E>(
        &self,
        work: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StoreError::from)?;
        let value = work()?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    // --- Users ---

    pub fn create_user(&self, new: &NewUser) -> Result<UserRecord> {
        let new = new.validated()?;
        let now = to_sql_time(Timestamp::now());
        let inserted = self.conn.execute(
            "INSERT INTO users (username, email, instagram_handle, twitter_handle, spotify_handle,
                                bio, top_genres, favorite_artists, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                new.username,
                new.email,
                new.instagram_handle,
                new.twitter_handle,
                new.spotify_handle,
                new.bio,
                to_json(&new.top_genres)?,
                to_json(&new.favorite_artists)?,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Duplicate(format!(
                    "user '{}' or email '{}'",
                    new.username, new.email
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let id = UserId(self.conn.last_insert_rowid());
        tracing::debug!("created user {id} ({})", new.username);
        self.user(id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    pub fn user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.0], user_from_row)
            .optional()?)
    }

    pub fn user_named(&self, username: &str) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        Ok(self
            .conn
            .query_row(&sql, [username.trim()], user_from_row)
            .optional()?)
    }

    pub fn require_user(&self, username: &str) -> Result<UserRecord> {
        self.user_named(username)?
            .ok_or_else(|| StoreError::NotFound(format!("user '{username}'")))
    }

    /// Apply a partial profile update. Counters are never touched here.
    pub fn save_user(&self, id: UserId, update: &UserUpdate) -> Result<UserRecord> {
        let mut user = self
            .user(id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        update.apply(&mut user)?;

        let written = self.conn.execute(
            "UPDATE users SET username = ?1, email = ?2, instagram_handle = ?3,
                    twitter_handle = ?4, spotify_handle = ?5, bio = ?6,
                    profile_picture_url = ?7, top_genres = ?8, favorite_artists = ?9,
                    updated_at = ?10
             WHERE id = ?11",
            params![
                user.username,
                user.email,
                user.instagram_handle,
                user.twitter_handle,
                user.spotify_handle,
                user.bio,
                user.profile_picture_url,
                to_json(&user.top_genres)?,
                to_json(&user.favorite_artists)?,
                to_sql_time(Timestamp::now()),
                id.0,
            ],
        );
        match written {
            Ok(_) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate(
                format!("user '{}' or email '{}'", user.username, user.email),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Case-insensitive substring match on username.
    pub fn search_users(
        &self,
        query: Option<&str>,
        exclude: Option<UserId>,
        limit: RankLimit,
    ) -> Result<Vec<UserRecord>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE (?1 IS NULL OR instr(lower(username), lower(?1)) > 0)
               AND (?2 IS NULL OR id <> ?2)
             ORDER BY username
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        stmt.query_map(
            params![query, exclude.map(|u| u.0), limit.get() as i64],
            user_from_row,
        )?
        .collect::<std::result::Result<_, _>>()
        .map_err(Into::into)
    }

    pub fn users_except(&self, exclude: UserId) -> Result<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id <> ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_map([exclude.0], user_from_row)?
            .collect::<std::result::Result<_, _>>()
            .map_err(Into::into)
    }

    pub fn increment_counter(&self, id: UserId, counter: Counter) -> Result<()> {
        let column = counter.column();
        let rows = self.conn.execute(
            &format!("UPDATE users SET {column} = {column} + 1 WHERE id = ?1"),
            [id.0],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    // --- Songs ---

    pub fn add_song(&self, owner: UserId, new: &NewSong) -> Result<Song> {
        let new = new.validated()?;
        let inserted = self.conn.execute(
            "INSERT INTO songs (user_id, title, artist, album, genre, spotify_id, user_rating,
                                is_favorite, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                owner.0,
                new.title,
                new.artist,
                new.album,
                new.genre,
                new.spotify_id,
                new.user_rating,
                new.is_favorite,
                to_sql_time(Timestamp::now()),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Duplicate(format!(
                    "song with spotify id '{}'",
                    new.spotify_id.as_deref().unwrap_or_default()
                )));
            }
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(StoreError::NotFound(format!("user {owner}")));
            }
            Err(e) => return Err(e.into()),
        }
        let id = SongId(self.conn.last_insert_rowid());
        self.song(id)?
            .ok_or_else(|| StoreError::NotFound(format!("song {id}")))
    }

    pub fn song(&self, id: SongId) -> Result<Option<Song>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.0], song_from_row)
            .optional()?)
    }

    /// Update a song owned by `owner`.
    pub fn save_song(&self, id: SongId, owner: UserId, update: &SongUpdate) -> Result<Song> {
        let mut song = self
            .song(id)?
            .filter(|s| s.user_id == owner)
            .ok_or_else(|| StoreError::NotFound(format!("song {id}")))?;
        update.apply(&mut song)?;

        self.conn.execute(
            "UPDATE songs SET title = ?1, artist = ?2, album = ?3, genre = ?4,
                    user_rating = ?5, is_favorite = ?6
             WHERE id = ?7",
            params![
                song.title,
                song.artist,
                song.album,
                song.genre,
                song.user_rating,
                song.is_favorite,
                id.0,
            ],
        )?;
        Ok(song)
    }

    pub fn delete_song(&self, id: SongId, owner: UserId) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM songs WHERE id = ?1 AND user_id = ?2",
            params![id.0, owner.0],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("song {id}")));
        }
        Ok(())
    }

    /// Newest first.
    pub fn list_songs(
        &self,
        owner: UserId,
        favorite_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Song>> {
        let sql = format!(
            "SELECT {SONG_COLUMNS} FROM songs
             WHERE user_id = ?1 AND (?2 = 0 OR is_favorite = 1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3"
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_map(params![owner.0, favorite_only, limit], song_from_row)?
            .collect::<std::result::Result<_, _>>()
            .map_err(Into::into)
    }

    /// Favorites, highest rated first, unrated last.
    pub fn top_songs(&self, owner: UserId, limit: RankLimit) -> Result<Vec<Song>> {
        let sql = format!(
            "SELECT {SONG_COLUMNS} FROM songs
             WHERE user_id = ?1 AND is_favorite = 1
             ORDER BY user_rating IS NULL, user_rating DESC, id DESC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_map(params![owner.0, limit.get() as i64], song_from_row)?
            .collect::<std::result::Result<_, _>>()
            .map_err(Into::into)
    }
}

// --- Collaborator impls ---

impl UserLookup for Store {
    fn user_by_id(&self, id: UserId) -> std::result::Result<Option<UserRecord>, StoreFault> {
        Ok(self.user(id)?)
    }

    fn user_by_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<UserRecord>, StoreFault> {
        Ok(self.user_named(username)?)
    }

    fn increment(&self, id: UserId, counter: Counter) -> std::result::Result<(), StoreFault> {
        Ok(self.increment_counter(id, counter)?)
    }

    fn list_users(&self, exclude: UserId) -> std::result::Result<Vec<UserRecord>, StoreFault> {
        Ok(self.users_except(exclude)?)
    }
}

impl SongRepository for Store {
    fn list_by_user(
        &self,
        user: UserId,
        favorite_only: bool,
    ) -> std::result::Result<Vec<Song>, StoreFault> {
        Ok(self.list_songs(user, favorite_only, None)?)
    }
}

// --- Row mapping ---

pub(crate) fn to_sql_time(ts: Timestamp) -> i64 {
    i64::try_from(ts.as_secs()).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_time(secs: i64) -> Timestamp {
    Timestamp(secs.max(0) as u64)
}

fn to_json(values: &[String]) -> Result<String> {
    serde_json::to_string(values).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        instagram_handle: row.get(3)?,
        twitter_handle: row.get(4)?,
        spotify_handle: row.get(5)?,
        bio: row.get(6)?,
        profile_picture_url: row.get(7)?,
        top_genres: json_list(row, 8)?,
        favorite_artists: json_list(row, 9)?,
        likes_received: row.get(10)?,
        connections_made: row.get(11)?,
        created_at: from_sql_time(row.get(12)?),
    })
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: SongId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        genre: row.get(5)?,
        spotify_id: row.get(6)?,
        user_rating: row.get(7)?,
        is_favorite: row.get(8)?,
        created_at: from_sql_time(row.get(9)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, genres: &[&str], artists: &[&str]) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            top_genres: genres.iter().map(|s| s.to_string()).collect(),
            favorite_artists: artists.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn new_song(title: &str, artist: &str, favorite: bool, rating: Option<f64>) -> NewSong {
        NewSong {
            title: title.to_string(),
            artist: artist.to_string(),
            user_rating: rating,
            is_favorite: favorite,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_load_user() {
        let store = Store::open_in_memory().unwrap();
        let created = store
            .create_user(&new_user("ana", &["pop", "rock"], &["Robyn"]))
            .unwrap();
        assert_eq!(created.username, "ana");
        assert_eq!(created.top_genres, vec!["pop", "rock"]);
        assert_eq!(created.likes_received, 0);

        let by_name = store.user_named("ana").unwrap().unwrap();
        assert_eq!(by_name, created);
        assert!(store.user(UserId(999)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.create_user(&new_user("ana", &[], &[])).unwrap();
        let mut again = new_user("ana", &[], &[]);
        again.email = "other@example.com".into();
        let err = store.create_user(&again).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "got {err}");
    }

    #[test]
    fn test_invalid_user_rejected() {
        let store = Store::open_in_memory().unwrap();
        let mut bad = new_user("ana", &[], &[]);
        bad.email = "nope".into();
        assert!(matches!(
            store.create_user(&bad),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_update_user_partial() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &["pop"], &[])).unwrap();
        store.increment_counter(ana.id, Counter::LikesReceived).unwrap();

        let update = UserUpdate {
            bio: Some("hi".into()),
            favorite_artists: Some(vec!["Robyn".into(), "Lorde".into()]),
            ..Default::default()
        };
        let updated = store.save_user(ana.id, &update).unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hi"));

        let loaded = store.user(ana.id).unwrap().unwrap();
        assert_eq!(loaded.favorite_artists, vec!["Robyn", "Lorde"]);
        assert_eq!(loaded.top_genres, vec!["pop"]);
        assert_eq!(loaded.likes_received, 1, "counters survive profile edits");
    }

    #[test]
    fn test_update_user_rename_collision() {
        let store = Store::open_in_memory().unwrap();
        store.create_user(&new_user("ana", &[], &[])).unwrap();
        let ben = store.create_user(&new_user("ben", &[], &[])).unwrap();
        let update = UserUpdate {
            username: Some("ana".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.save_user(ben.id, &update),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.user(ben.id).unwrap().unwrap().username, "ben");
    }

    #[test]
    fn test_search_users() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &[], &[])).unwrap();
        store.create_user(&new_user("Anabel", &[], &[])).unwrap();
        store.create_user(&new_user("ben", &[], &[])).unwrap();

        let hits = store
            .search_users(Some("ANA"), None, RankLimit::new(10))
            .unwrap();
        assert_eq!(hits.len(), 2);

        let hits = store
            .search_users(Some("ana"), Some(ana.id), RankLimit::new(10))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "Anabel");

        let all = store.search_users(None, None, RankLimit::new(2)).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_increment_counter() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &[], &[])).unwrap();
        store.increment_counter(ana.id, Counter::ConnectionsMade).unwrap();
        store.increment_counter(ana.id, Counter::ConnectionsMade).unwrap();
        store.increment_counter(ana.id, Counter::LikesReceived).unwrap();
        let loaded = store.user(ana.id).unwrap().unwrap();
        assert_eq!(loaded.connections_made, 2);
        assert_eq!(loaded.likes_received, 1);

        assert!(matches!(
            store.increment_counter(UserId(404), Counter::LikesReceived),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_song_crud() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &[], &[])).unwrap();
        let ben = store.create_user(&new_user("ben", &[], &[])).unwrap();

        let song = store
            .add_song(ana.id, &new_song("Dancing On My Own", "Robyn", false, None))
            .unwrap();
        assert_eq!(song.user_id, ana.id);
        assert!(!song.is_favorite);

        let update = SongUpdate {
            is_favorite: Some(true),
            user_rating: Some(4.5),
            ..Default::default()
        };
        let updated = store.save_song(song.id, ana.id, &update).unwrap();
        assert!(updated.is_favorite);
        assert_eq!(store.song(song.id).unwrap().unwrap().user_rating, Some(4.5));

        assert!(matches!(
            store.save_song(song.id, ben.id, &update),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_song(song.id, ben.id),
            Err(StoreError::NotFound(_))
        ));
        store.delete_song(song.id, ana.id).unwrap();
        assert!(store.song(song.id).unwrap().is_none());
    }

    #[test]
    fn test_song_for_missing_user() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .add_song(UserId(42), &new_song("Song", "Artist", false, None))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {err}");
    }

    #[test]
    fn test_duplicate_spotify_id() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &[], &[])).unwrap();
        let mut song = new_song("Song", "Artist", false, None);
        song.spotify_id = Some("sp:1".into());
        store.add_song(ana.id, &song).unwrap();
        assert!(matches!(
            store.add_song(ana.id, &song),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn test_list_and_top_songs() {
        let store = Store::open_in_memory().unwrap();
        let ana = store.create_user(&new_user("ana", &[], &[])).unwrap();
        store.add_song(ana.id, &new_song("One", "A", true, None)).unwrap();
        store.add_song(ana.id, &new_song("Two", "B", false, Some(5.0))).unwrap();
        store.add_song(ana.id, &new_song("Three", "C", true, Some(3.0))).unwrap();
        store.add_song(ana.id, &new_song("Four", "D", true, Some(4.5))).unwrap();

        let all = store.list_songs(ana.id, false, None).unwrap();
        let titles: Vec<&str> = all.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Four", "Three", "Two", "One"]);

        let favorites = store.list_songs(ana.id, true, Some(2)).unwrap();
        assert_eq!(favorites.len(), 2);
        assert!(favorites.iter().all(|s| s.is_favorite));

        let top = store.top_songs(ana.id, RankLimit::new(10)).unwrap();
        let titles: Vec<&str> = top.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Four", "Three", "One"]);
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("intune.db");
        let store = Store::open(&path).unwrap();
        store.create_user(&new_user("ana", &[], &[])).unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert!(reopened.user_named("ana").unwrap().is_some());
    }

    #[test]
    fn test_open_refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intune.db");
        let store = Store::open(&path).unwrap();
        store
            .conn()
            .execute(
                "UPDATE metadata SET value = '99' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
        drop(store);

        let err = Store::open(&path).err().expect("newer schema refused");
        assert!(matches!(err, StoreError::InvalidData(_)), "got {err}");
    }
}
