//! Shared domain types for Threadline: the message model, the persisted
//! event taxonomy, streaming events, cancellation, errors, and config.

pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod stream;

pub use cancel::CancelToken;
pub use error::{Error, Result};
