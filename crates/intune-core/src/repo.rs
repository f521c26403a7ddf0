//! Collaborator interfaces consumed by the lifecycle.
//!
//! Implementations own durability and concurrency control. Two guards are
//! required of a `ConnectionStore`: `insert` must refuse a second row for the
//! same ordered pair, and `update` must refuse to write when the stored state
//! is no longer `expected`. Both refusals are reported as `StoreFault::Conflict`;
//! no other failure may be. `atomically` groups the writes of one lifecycle
//! call, counter increments included, into a single commit.

use std::collections::HashSet;

use thiserror::Error;

use crate::connection::{Connection, ConnectionState, NewConnection, Role};
use crate::model::{ConnectionId, Counter, Song, UserId, UserRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// A guarded write lost against a concurrent change.
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("store failure: {0}")]
    Backend(String),
}

pub trait UserLookup {
    fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreFault>;

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreFault>;

    /// Add one to a lifetime counter.
    fn increment(&self, id: UserId, counter: Counter) -> Result<(), StoreFault>;

    /// Every user except `exclude`, in id order.
    fn list_users(&self, exclude: UserId) -> Result<Vec<UserRecord>, StoreFault>;
}

pub trait SongRepository {
    fn list_by_user(&self, user: UserId, favorite_only: bool) -> Result<Vec<Song>, StoreFault>;
}

pub trait ConnectionStore {
    fn find_ordered(
        &self,
        initiator: UserId,
        target: UserId,
    ) -> Result<Option<Connection>, StoreFault>;

    fn insert(&self, new: NewConnection) -> Result<Connection, StoreFault>;

    fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, StoreFault>;

    /// Write `connection` only if the stored row is still in `expected`.
    fn update(
        &self,
        connection: &Connection,
        expected: ConnectionState,
    ) -> Result<Connection, StoreFault>;

    /// Run `work` as one transaction. Writes made inside it through this store
    /// or a `UserLookup` sharing its backend commit together, or not at all
    /// when `work` fails.
    fn atomically(
        &self,
        work: &mut dyn FnMut() -> Result<(), StoreFault>,
    ) -> Result<(), StoreFault>;

    /// Connections where `user` plays `role`, newest first.
    fn query_by_user(
        &self,
        user: UserId,
        role: Role,
        state: Option<ConnectionState>,
    ) -> Result<Vec<Connection>, StoreFault>;

    /// Ordered `(initiator, target)` pairs of every connection touching `user`.
    fn pairs_for(&self, user: UserId) -> Result<HashSet<(UserId, UserId)>, StoreFault> {
        let mut pairs = HashSet::new();
        for role in [Role::Initiator, Role::Target] {
            for c in self.query_by_user(user, role, None)? {
                pairs.insert((c.initiator_id, c.target_id));
            }
        }
        Ok(pairs)
    }
}
