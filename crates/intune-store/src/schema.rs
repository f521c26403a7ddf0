use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            username             TEXT NOT NULL UNIQUE,
            email                TEXT NOT NULL UNIQUE,
            instagram_handle     TEXT,
            twitter_handle       TEXT,
            spotify_handle       TEXT,
            bio                  TEXT,
            profile_picture_url  TEXT,
            top_genres           TEXT NOT NULL DEFAULT '[]',
            favorite_artists     TEXT NOT NULL DEFAULT '[]',
            likes_received       INTEGER NOT NULL DEFAULT 0,
            connections_made     INTEGER NOT NULL DEFAULT 0,
            created_at           INTEGER NOT NULL,
            updated_at           INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS songs (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title        TEXT NOT NULL,
            artist       TEXT NOT NULL,
            album        TEXT,
            genre        TEXT,
            spotify_id   TEXT UNIQUE,
            user_rating  REAL CHECK (user_rating IS NULL OR user_rating BETWEEN 1 AND 5),
            is_favorite  INTEGER NOT NULL DEFAULT 0,
            created_at   INTEGER NOT NULL
        );

        -- recommended_song_id is attribution only, deliberately not a foreign key
        CREATE TABLE IF NOT EXISTS connections (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            initiator_id         INTEGER NOT NULL REFERENCES users(id),
            target_id            INTEGER NOT NULL REFERENCES users(id),
            score                REAL NOT NULL,
            state                TEXT NOT NULL DEFAULT 'pending'
                                 CHECK (state IN ('pending', 'accepted', 'rejected', 'blocked')),
            recommended_song_id  INTEGER,
            message              TEXT CHECK (message IS NULL OR length(message) <= 500),
            created_at           INTEGER NOT NULL,
            updated_at           INTEGER NOT NULL,
            UNIQUE (initiator_id, target_id),
            CHECK (initiator_id <> target_id)
        );

        CREATE INDEX IF NOT EXISTS idx_songs_user ON songs(user_id, is_favorite);
        CREATE INDEX IF NOT EXISTS idx_conn_initiator ON connections(initiator_id, state);
        CREATE INDEX IF NOT EXISTS idx_conn_target ON connections(target_id, state);
        ",
    )?;

    if let Some(found) = schema_version(conn)?
        && found > SCHEMA_VERSION
    {
        return Err(StoreError::InvalidData(format!(
            "database schema v{found} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tracing::info!("schema ready (version {SCHEMA_VERSION})");
    Ok(())
}

/// Version recorded in `metadata`, if the database was initialized before.
pub fn schema_version(conn: &Connection) -> Result<Option<i64>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<i64>()
            .map_err(|_| StoreError::InvalidData(format!("bad schema_version '{v}'")))
    })
    .transpose()
}
