//! Connection persistence.
//!
//! The ordered-pair UNIQUE constraint rejects a second proposal that slipped
//! past the lifecycle's read check, and `update_connection_state` only writes
//! when the row is still in the state the caller read.

use intune_core::{
    Connection, ConnectionId, ConnectionState, ConnectionStore, NewConnection, Role, SongId,
    StoreFault, UserId,
};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use crate::error::{Result, StoreError, is_unique_violation};
use crate::store::{Store, from_sql_time, to_sql_time};

const CONNECTION_COLUMNS: &str = "id, initiator_id, target_id, score, state, recommended_song_id,
     message, created_at, updated_at";

impl Store {
    pub fn insert_connection(&self, new: NewConnection) -> Result<Connection> {
        let inserted = self.conn().execute(
            "INSERT INTO connections (initiator_id, target_id, score, state,
                                      recommended_song_id, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?6)",
            params![
                new.initiator_id.0,
                new.target_id.0,
                new.score,
                new.recommended_track_ref.map(|s| s.0),
                new.message,
                to_sql_time(new.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Duplicate(format!(
                    "connection {} -> {}",
                    new.initiator_id, new.target_id
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let id = ConnectionId(self.conn().last_insert_rowid());
        tracing::debug!(
            "connection {id} created: {} -> {}",
            new.initiator_id,
            new.target_id
        );
        Ok(new.into_connection(id))
    }

    pub fn connection(&self, id: ConnectionId) -> Result<Option<Connection>> {
        let sql = format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, [id.0], connection_from_row)
            .optional()?)
    }

    pub fn connection_between(
        &self,
        initiator: UserId,
        target: UserId,
    ) -> Result<Option<Connection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections
             WHERE initiator_id = ?1 AND target_id = ?2"
        );
        Ok(self
            .conn()
            .query_row(&sql, params![initiator.0, target.0], connection_from_row)
            .optional()?)
    }

    /// Compare-and-swap on `state`: writes `next` only while the row is still
    /// in `expected`.
    pub fn update_connection_state(
        &self,
        next: &Connection,
        expected: ConnectionState,
    ) -> Result<Connection> {
        let rows = self.conn().execute(
            "UPDATE connections SET state = ?1, updated_at = ?2
             WHERE id = ?3 AND state = ?4",
            params![
                next.state.as_str(),
                to_sql_time(next.updated_at),
                next.id.0,
                expected.as_str(),
            ],
        )?;
        if rows == 1 {
            return Ok(next.clone());
        }
        match self.connection(next.id)? {
            Some(current) => Err(StoreError::Conflict(format!(
                "connection {} is {}, expected {expected}",
                next.id, current.state
            ))),
            None => Err(StoreError::NotFound(format!("connection {}", next.id))),
        }
    }

    /// Newest first.
    pub fn connections_for(
        &self,
        user: UserId,
        role: Role,
        state: Option<ConnectionState>,
    ) -> Result<Vec<Connection>> {
        let column = match role {
            Role::Initiator => "initiator_id",
            Role::Target => "target_id",
        };
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections
             WHERE {column} = ?1 AND (?2 IS NULL OR state = ?2)
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        stmt.query_map(
            params![user.0, state.map(ConnectionState::as_str)],
            connection_from_row,
        )?
        .collect::<std::result::Result<_, _>>()
        .map_err(Into::into)
    }
}

impl ConnectionStore for Store {
    fn find_ordered(
        &self,
        initiator: UserId,
        target: UserId,
    ) -> std::result::Result<Option<Connection>, StoreFault> {
        Ok(self.connection_between(initiator, target)?)
    }

    fn insert(&self, new: NewConnection) -> std::result::Result<Connection, StoreFault> {
        Ok(self.insert_connection(new)?)
    }

    fn find_by_id(&self, id: ConnectionId) -> std::result::Result<Option<Connection>, StoreFault> {
        Ok(self.connection(id)?)
    }

    fn update(
        &self,
        connection: &Connection,
        expected: ConnectionState,
    ) -> std::result::Result<Connection, StoreFault> {
        Ok(self.update_connection_state(connection, expected)?)
    }

    fn atomically(
        &self,
        work: &mut dyn FnMut() -> std::result::Result<(), StoreFault>,
    ) -> std::result::Result<(), StoreFault> {
        self.in_transaction(work)
    }

    fn query_by_user(
        &self,
        user: UserId,
        role: Role,
        state: Option<ConnectionState>,
    ) -> std::result::Result<Vec<Connection>, StoreFault> {
        Ok(self.connections_for(user, role, state)?)
    }
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    let state: String = row.get(4)?;
    let state = state
        .parse::<ConnectionState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Connection {
        id: ConnectionId(row.get(0)?),
        initiator_id: UserId(row.get(1)?),
        target_id: UserId(row.get(2)?),
        score: row.get(3)?,
        state,
        recommended_track_ref: row.get::<_, Option<i64>>(5)?.map(SongId),
        message: row.get(6)?,
        created_at: from_sql_time(row.get(7)?),
        updated_at: from_sql_time(row.get(8)?),
    })
}
