/// Shared error type used across all Threadline crates.
///
/// The first group is the request-level taxonomy surfaced to HTTP clients;
/// the rest covers internal failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store: {0}")]
    Store(String),

    #[error("model: {0}")]
    Model(String),

    /// Not a failure — an aborted run terminates with this.
    #[error("cancelled")]
    Cancelled,

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
