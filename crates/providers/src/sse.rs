//! SSE plumbing shared by streaming adapters.
//!
//! Wire format: events are blocks separated by `\n\n`; only `data:` lines
//! carry payloads. [`SseBuffer`] accumulates body chunks and yields complete
//! payloads; [`event_stream`] turns a `reqwest::Response` plus a payload
//! parser into a [`BoxStream`] of stream events.

use tl_domain::error::Result;
use tl_domain::stream::{BoxStream, StreamEvent};

use crate::from_reqwest;

/// Incremental SSE payload extractor.
#[derive(Default)]
pub(crate) struct SseBuffer {
    pending: String,
}

impl SseBuffer {
    /// Feed one body chunk; returns every complete `data:` payload it
    /// unlocked. Partial trailing events stay buffered.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.find("\n\n") {
            let block: String = self.pending.drain(..pos + 2).collect();
            for line in block.lines() {
                if let Some(data) = line.trim().strip_prefix("data:") {
                    let data = data.trim();
                    if !data.is_empty() {
                        payloads.push(data.to_owned());
                    }
                }
            }
        }
        payloads
    }

    /// Flush whatever is left once the body closes (a server may omit the
    /// final delimiter).
    pub fn finish(mut self) -> Vec<String> {
        if self.pending.trim().is_empty() {
            return Vec::new();
        }
        self.push("\n\n")
    }
}

/// Build a stream of events from an SSE response body and a payload parser.
///
/// The parser is `FnMut` so adapters can keep assembly state (e.g. partial
/// tool-call arguments) across payloads. If the parser never produces a
/// `Done`, one is synthesized when the body ends so consumers always see a
/// terminator.
pub(crate) fn event_stream<F>(
    response: reqwest::Response,
    mut parse: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = SseBuffer::default();
        let mut done_seen = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    for payload in buffer.push(&String::from_utf8_lossy(&bytes)) {
                        for event in parse(&payload) {
                            done_seen |= matches!(&event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    for payload in buffer.finish() {
                        for event in parse(&payload) {
                            done_seen |= matches!(&event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_seen {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}
