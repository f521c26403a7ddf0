use intune_core::{StoreFault, ValidationError};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("stale write: {0}")]
    Conflict(String),
}

impl StoreError {
    /// A UNIQUE index rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::Sqlite(e) if is_unique_violation(e))
    }
}

fn constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(f.extended_code)
        }
        _ => None,
    }
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    constraint_code(e) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE)
}

pub(crate) fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    constraint_code(e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

/// Only lost races are `Conflict`; CHECK, foreign-key and trigger aborts are
/// plain backend failures.
impl From<StoreError> for StoreFault {
    fn from(e: StoreError) -> Self {
        if e.is_unique_violation() {
            return StoreFault::Conflict(e.to_string());
        }
        match e {
            StoreError::Duplicate(_) | StoreError::Conflict(_) => StoreFault::Conflict(e.to_string()),
            other => StoreFault::Backend(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    fn failure(sql: &str) -> StoreError {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE p (id INTEGER PRIMARY KEY, name TEXT UNIQUE, n INTEGER CHECK (n > 0));
             CREATE TABLE c (id INTEGER PRIMARY KEY, p_id INTEGER REFERENCES p(id));
             INSERT INTO p (id, name, n) VALUES (1, 'a', 1);",
        )
        .unwrap();
        StoreError::from(conn.execute_batch(sql).unwrap_err())
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = failure("INSERT INTO p (name, n) VALUES ('a', 2)");
        assert!(err.is_unique_violation());
        assert!(matches!(StoreFault::from(err), StoreFault::Conflict(_)));
    }

    #[test]
    fn test_other_constraints_are_backend() {
        for sql in [
            "INSERT INTO p (name, n) VALUES ('b', 0)",
            "INSERT INTO c (p_id) VALUES (9)",
            "CREATE TRIGGER t BEFORE UPDATE ON p BEGIN SELECT RAISE(ABORT, 'no'); END;
             UPDATE p SET n = 2 WHERE id = 1",
        ] {
            let err = failure(sql);
            assert!(!err.is_unique_violation(), "{sql}");
            assert!(
                matches!(StoreFault::from(err), StoreFault::Backend(_)),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_logical_conflicts_map_to_conflict() {
        assert!(matches!(
            StoreFault::from(StoreError::Conflict("x".into())),
            StoreFault::Conflict(_)
        ));
        assert!(matches!(
            StoreFault::from(StoreError::NotFound("x".into())),
            StoreFault::Backend(_)
        ));
    }
}
