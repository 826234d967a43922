//! Chat-model provider contract and adapters.
//!
//! The core only ever talks to [`ChatModel`]; the bundled adapter speaks the
//! OpenAI-compatible chat completions wire format. [`scripted`] provides a
//! deterministic in-memory model for driving the runtime in tests.

pub mod openai_compat;
pub mod scripted;
pub(crate) mod sse;
pub mod traits;

pub use openai_compat::OpenAiCompatModel;
pub use scripted::ScriptedModel;
pub use traits::{ChatModel, ChatRequest};

pub(crate) fn from_reqwest(e: reqwest::Error) -> tl_domain::Error {
    tl_domain::Error::Model(e.to_string())
}
