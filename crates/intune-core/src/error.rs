use serde::Serialize;
use thiserror::Error;

use crate::connection::ConnectionState;
use crate::model::{ConnectionId, UserId};
use crate::repo::StoreFault;

/// Stable classification of a lifecycle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTarget,
    TargetNotFound,
    UserNotFound,
    DuplicateConnection,
    NotFound,
    Forbidden,
    InvalidTransition,
    InvalidMessage,
    StoreConflict,
    Store,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectError {
    #[error("cannot connect user {0} to themselves")]
    InvalidTarget(UserId),
    #[error("target user {0} not found")]
    TargetNotFound(UserId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("connection from {initiator} to {target} already exists")]
    DuplicateConnection { initiator: UserId, target: UserId },
    #[error("connection {0} not found")]
    NotFound(ConnectionId),
    #[error("user {actor} may not resolve connection {connection}")]
    Forbidden {
        connection: ConnectionId,
        actor: UserId,
    },
    #[error("cannot move connection from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
    #[error("message is {0} characters, limit is {1}")]
    InvalidMessage(usize, usize),
    #[error("connection changed concurrently: {0}")]
    StoreConflict(String),
    #[error(transparent)]
    Store(StoreFault),
}

impl ConnectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            ConnectError::TargetNotFound(_) => ErrorKind::TargetNotFound,
            ConnectError::UserNotFound(_) => ErrorKind::UserNotFound,
            ConnectError::DuplicateConnection { .. } => ErrorKind::DuplicateConnection,
            ConnectError::NotFound(_) => ErrorKind::NotFound,
            ConnectError::Forbidden { .. } => ErrorKind::Forbidden,
            ConnectError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            ConnectError::InvalidMessage(..) => ErrorKind::InvalidMessage,
            ConnectError::StoreConflict(_) => ErrorKind::StoreConflict,
            ConnectError::Store(_) => ErrorKind::Store,
        }
    }

    /// Only a lost transactional race is worth re-reading and retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StoreConflict
    }
}

impl From<StoreFault> for ConnectError {
    fn from(fault: StoreFault) -> Self {
        match fault {
            StoreFault::Conflict(detail) => ConnectError::StoreConflict(detail),
            other => ConnectError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_retry() {
        let conflict: ConnectError = StoreFault::Conflict("state drifted".into()).into();
        assert_eq!(conflict.kind(), ErrorKind::StoreConflict);
        assert!(conflict.is_retryable());

        let backend: ConnectError = StoreFault::Backend("disk full".into()).into();
        assert_eq!(backend.kind(), ErrorKind::Store);
        assert!(!backend.is_retryable());
        assert!(!ConnectError::NotFound(ConnectionId(1)).is_retryable());
    }

    #[test]
    fn test_detail_messages() {
        let err = ConnectError::InvalidTransition {
            from: ConnectionState::Accepted,
            to: ConnectionState::Rejected,
        };
        assert_eq!(err.to_string(), "cannot move connection from accepted to rejected");
        let err = ConnectError::DuplicateConnection {
            initiator: UserId(1),
            target: UserId(2),
        };
        assert_eq!(err.to_string(), "connection from 1 to 2 already exists");
    }
}
