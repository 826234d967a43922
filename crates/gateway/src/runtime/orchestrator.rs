//! Session orchestrator — binds a session to one agent-loop execution.
//!
//! Per turn: resolve new-vs-continuation, rebuild the message history,
//! restore tool state, wire the agent loop into the event queue, run the
//! prompt, then write exactly one terminal event and one status transition.
//! Cross-process aborts arrive through the queue's status poll, never by
//! touching the in-memory agent from another task.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::Instrument;

use tl_domain::error::{Error, Result};
use tl_domain::event::{EventType, MessagePayload, TerminalPayload};
use tl_domain::message::Message;
use tl_domain::CancelToken;
use tl_store::{SessionRow, SessionStatus, StatusExtras};
use tl_tools::{HttpFetchTool, Mount, ShellTool, Tool, ToolContext, ToolExecutor, WorkspaceTool};

use crate::runtime::agent::{Agent, AgentConfig};
use crate::runtime::queue::EventQueue;
use crate::runtime::replay;
use crate::state::AppState;

pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    /// Explicitly-supplied history (e.g. from a chat-platform thread);
    /// short-circuits log reconstruction.
    pub context: Option<Vec<Message>>,
}

/// Handle returned to the transport: the session id is known immediately,
/// the terminal status arrives when the run task finishes.
#[derive(Debug)]
pub struct TurnHandle {
    pub session_id: String,
    pub done: oneshot::Receiver<SessionStatus>,
}

/// Validate the request, resolve the session, and spawn the run task.
///
/// Everything that can be refused (`invalid_request`, `not_configured`,
/// `not_found`, `conflict`) is refused here, before anything is persisted
/// for new sessions and before the status transition for continuations.
pub fn start_turn(state: &AppState, req: TurnRequest) -> Result<TurnHandle> {
    if req.message.trim().is_empty() {
        return Err(Error::InvalidRequest("message must not be empty".into()));
    }
    let model = state
        .model
        .clone()
        .ok_or_else(|| Error::NotConfigured("no model credential configured".into()))?;

    let session_id = match &req.session_id {
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            state
                .store
                .upsert_session(&SessionRow::new(&id, &req.message))?;
            tracing::info!(session_id = %id, "session created");
            id
        }
        Some(id) => {
            let row = state
                .store
                .get_session(id)?
                .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
            if row.status == SessionStatus::Running {
                return Err(Error::Conflict(format!(
                    "session {id} is running; abort it or wait for completion"
                )));
            }
            state.store.set_status(
                id,
                SessionStatus::Running,
                StatusExtras {
                    completed_at: Some(None),
                    error: Some(None),
                    ..Default::default()
                },
            )?;
            tracing::info!(session_id = %id, "session continued");
            id.clone()
        }
    };

    let (done_tx, done_rx) = oneshot::channel();
    let span = tracing::info_span!("turn", session_id = %session_id);
    let task_state = state.clone();
    let task_session = session_id.clone();
    tokio::spawn(
        async move {
            let status = run_turn(&task_state, &task_session, model, req).await;
            let _ = done_tx.send(status);
        }
        .instrument(span),
    );

    Ok(TurnHandle {
        session_id,
        done: done_rx,
    })
}

/// The run task body. Always leaves the session in a terminal state unless
/// an external abort already did.
async fn run_turn(
    state: &AppState,
    session_id: &str,
    model: Arc<dyn tl_providers::ChatModel>,
    req: TurnRequest,
) -> SessionStatus {
    let cancel = CancelToken::new();
    let abort_cancel = cancel.clone();
    let queue = EventQueue::new(
        state.store.clone(),
        session_id.to_owned(),
        state.config.runtime.abort_check_interval(),
        Box::new(move || abort_cancel.cancel()),
    );

    let outcome = drive_agent(state, session_id, model, req, &cancel, &queue).await;
    queue.flush().await;

    match outcome {
        Ok(agent) => {
            if queue.was_aborted_externally() {
                // The abort endpoint already wrote session_aborted and the
                // terminal status; do not overwrite either.
                tracing::info!(session_id, "run stopped by external abort");
                return SessionStatus::Completed;
            }

            queue.push(EventType::SessionComplete, serde_json::json!({}));
            queue.flush().await;

            let usage = agent.total_usage();
            if usage.total_tokens > 0 {
                if let Err(e) = state.store.add_usage(session_id, &usage) {
                    tracing::warn!(session_id, error = %e, "failed to record usage");
                }
            }

            let response = serde_json::to_value(agent.messages()).unwrap_or_default();
            match state.store.transition_from_running(
                session_id,
                SessionStatus::Completed,
                StatusExtras {
                    response: Some(response),
                    event_count: Some(queue.count()),
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            ) {
                Ok(true) => {
                    tracing::info!(session_id, events = queue.count(), "session completed");
                }
                Ok(false) => {
                    // Lost the race to an abort that landed after our last
                    // poll; the abort's terminal state stands.
                    tracing::info!(session_id, "completion lost terminal race; leaving status");
                }
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "failed to finalize session row");
                }
            }
            SessionStatus::Completed
        }
        Err(e) => {
            // Abort raced the failure: keep the abort's outcome.
            if queue.was_aborted_externally() {
                tracing::info!(session_id, error = %e, "run failed after external abort");
                return SessionStatus::Completed;
            }
            if let Ok(Some(row)) = state.store.get_session(session_id) {
                if row.status == SessionStatus::Completed {
                    return SessionStatus::Completed;
                }
            }

            tracing::warn!(session_id, error = %e, "run failed");
            queue.push(
                EventType::SessionError,
                serde_json::to_value(TerminalPayload {
                    message: e.to_string(),
                })
                .unwrap_or_default(),
            );
            queue.flush().await;

            if let Err(err) = state.store.transition_from_running(
                session_id,
                SessionStatus::Error,
                StatusExtras {
                    error: Some(Some(e.to_string())),
                    event_count: Some(queue.count()),
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            ) {
                tracing::warn!(session_id, error = %err, "failed to record error status");
            }
            SessionStatus::Error
        }
    }
}

/// Build history, tools, and the agent, then run the prompt.
async fn drive_agent(
    state: &AppState,
    session_id: &str,
    model: Arc<dyn tl_providers::ChatModel>,
    req: TurnRequest,
    cancel: &CancelToken,
    queue: &EventQueue,
) -> Result<Arc<Agent>> {
    // Snapshot the log BEFORE enqueueing this turn's user_message so the
    // new message enters the history exactly once, via prompt().
    let history = match req.context {
        Some(context) => context,
        None => {
            let prior = state.store.list_events(session_id, None)?;
            replay::reconstruct(&prior)
        }
    };

    // Tools are per-session; restore persistent tool state before the
    // loop starts.
    let workspace = WorkspaceTool::new(&state.config.tools.workspace.root, session_id)?;
    let mounts: Vec<Mount> = state
        .store
        .list_mounts(session_id)?
        .into_iter()
        .map(|m| Mount {
            mount_path: m.mount_path,
            mount_type: m.mount_type,
            config: m.config,
        })
        .collect();
    workspace.restore_mounts(&mounts)?;

    let shell = ShellTool::new(
        state.config.tools.shell.clone(),
        workspace.dir().to_path_buf(),
    );
    let fetch = HttpFetchTool::new(&state.config.tools.fetch)?;
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(workspace), Arc::new(shell), Arc::new(fetch)];

    let agent = Arc::new(Agent::new(
        model,
        ToolExecutor::new(tools),
        ToolContext {
            session_id: session_id.to_owned(),
            cancel: cancel.clone(),
            sink: Arc::new(queue.clone()),
        },
        AgentConfig {
            system_prompt: state.config.model.system_prompt.clone(),
            temperature: state.config.model.temperature,
            max_tokens: state.config.model.max_tokens,
        },
        cancel.clone(),
        None,
    ));
    agent.replace_messages(history);

    // Forward every durable event into the queue, in emission order.
    let forward = queue.clone();
    agent.subscribe(Box::new(move |event| {
        if let Some((kind, data)) = event.to_record() {
            forward.push(kind, data);
        }
    }));

    let user_message = Message::user(&req.message);
    queue.push(
        EventType::UserMessage,
        serde_json::to_value(MessagePayload {
            message: user_message.clone(),
        })?,
    );

    agent.prompt(user_message).await?;
    Ok(agent)
}
