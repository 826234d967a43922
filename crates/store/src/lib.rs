//! Append-only event log persistence for Threadline sessions.
//!
//! One SQLite database holds the session lifecycle rows, the per-session
//! event logs, chat-platform thread mappings, and tool mount records.

pub mod db;
pub mod error;
pub mod records;

pub use db::EventStore;
pub use error::StoreError;
pub use records::{
    EventRow, MountRecord, SessionRow, SessionStatus, SessionSummary, StatusExtras, ThreadMapping,
};
