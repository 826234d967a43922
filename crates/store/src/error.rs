//! Store failure classification.
//!
//! Appends and reads can fail two ways: `Transient` (lock contention, busy
//! database, I/O hiccup — the event queue retries these best-effort) and
//! `Fatal` (schema or type mismatch — retrying cannot help).

use rusqlite::ErrorCode;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("fatal store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull => StoreError::Transient(e.to_string()),
                _ => StoreError::Fatal(e.to_string()),
            },
            _ => StoreError::Fatal(e.to_string()),
        }
    }
}

impl From<StoreError> for tl_domain::Error {
    fn from(e: StoreError) -> Self {
        tl_domain::Error::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
