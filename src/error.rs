use std::time::Duration;

use thiserror::Error;

pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("couldn't connect to the database: {0}")]
    Connection(#[source] DriverError),
    #[error("database didn't answer the ping: {0}")]
    Ping(#[source] DriverError),
    #[error("query failed: {0}")]
    Query(#[source] DriverError),
    #[error("couldn't decode document from cursor: {0}")]
    CursorDecode(#[source] DriverError),
    #[error("cursor terminated abnormally: {0}")]
    CursorIteration(#[source] DriverError),
    #[error("insert failed: {0}")]
    Insert(#[source] DriverError),
    #[error("delete failed: {0}")]
    Delete(#[source] DriverError),
    #[error("update failed: {0}")]
    Update(#[source] DriverError),
    #[error("no latest chapter found")]
    NotFound,
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Fieldless mirror of [`StoreError`] for matching on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Ping,
    Query,
    CursorDecode,
    CursorIteration,
    Insert,
    Delete,
    Update,
    NotFound,
    Cancelled,
    TimedOut,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connection(_) => ErrorKind::Connection,
            StoreError::Ping(_) => ErrorKind::Ping,
            StoreError::Query(_) => ErrorKind::Query,
            StoreError::CursorDecode(_) => ErrorKind::CursorDecode,
            StoreError::CursorIteration(_) => ErrorKind::CursorIteration,
            StoreError::Insert(_) => ErrorKind::Insert,
            StoreError::Delete(_) => ErrorKind::Delete,
            StoreError::Update(_) => ErrorKind::Update,
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Cancelled => ErrorKind::Cancelled,
            StoreError::TimedOut(_) => ErrorKind::TimedOut,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

#[derive(Debug, Error)]
#[error("chapter number {0} can't be advanced any further")]
pub struct ChapterOverflow(pub i64);
