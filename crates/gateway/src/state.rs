use std::sync::Arc;

use tl_domain::config::Config;
use tl_providers::ChatModel;
use tl_store::EventStore;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The event log store — the only writer–reader boundary in the system.
    pub store: Arc<EventStore>,
    /// `None` when no model credential is configured; chat requests are
    /// then refused as `not_configured` before any session is created.
    pub model: Option<Arc<dyn ChatModel>>,
}
