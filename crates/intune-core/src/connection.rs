//! Connection records and their state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ConnectionId, SongId, UserId};
use crate::similarity::SimilarityScore;
use crate::time::Timestamp;

/// `Pending` is the only initial state; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Pending,
    Accepted,
    Rejected,
    Blocked,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 4] = [
        ConnectionState::Pending,
        ConnectionState::Accepted,
        ConnectionState::Rejected,
        ConnectionState::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Pending => "pending",
            ConnectionState::Accepted => "accepted",
            ConnectionState::Rejected => "rejected",
            ConnectionState::Blocked => "blocked",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ConnectionState::Pending)
    }

    /// Legal moves: Pending -> Accepted | Rejected | Blocked. Nothing else.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (
                ConnectionState::Pending,
                ConnectionState::Accepted | ConnectionState::Rejected | ConnectionState::Blocked
            )
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown connection state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for ConnectionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// A directed proposal from `initiator_id` to `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub initiator_id: UserId,
    pub target_id: UserId,
    pub score: SimilarityScore,
    pub state: ConnectionState,
    pub recommended_track_ref: Option<SongId>,
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Connection {
    /// The party that is not `user`, if `user` belongs to this connection.
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if user == self.initiator_id {
            Some(self.target_id)
        } else if user == self.target_id {
            Some(self.initiator_id)
        } else {
            None
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.counterpart(user).is_some()
    }
}

/// A connection that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConnection {
    pub initiator_id: UserId,
    pub target_id: UserId,
    pub score: SimilarityScore,
    pub recommended_track_ref: Option<SongId>,
    pub message: Option<String>,
    pub created_at: Timestamp,
}

impl NewConnection {
    pub fn into_connection(self, id: ConnectionId) -> Connection {
        Connection {
            id,
            initiator_id: self.initiator_id,
            target_id: self.target_id,
            score: self.score,
            state: ConnectionState::Pending,
            recommended_track_ref: self.recommended_track_ref,
            message: self.message,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Which side of a connection a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Initiator,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Accepted connections the user initiated.
    pub accepted_count: usize,
    pub pending_sent_count: usize,
    pub pending_received_count: usize,
    pub likes_received: u32,
    pub connections_made: u32,
}

/// An accepted connection seen from one user's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub connection_id: ConnectionId,
    pub other_user_id: UserId,
    pub score: SimilarityScore,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
