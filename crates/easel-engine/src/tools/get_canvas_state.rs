use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use easel_core::canvas::StateSnapshot;
use easel_core::events::CanvasEvent;
use easel_core::phase::RunPhase;
use easel_core::tools::{Tool, ToolContext, ToolError};

use crate::mailbox::{MailboxRecv, StateMailbox};
use crate::phase::PhaseHandle;

pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Headroom over the mailbox wait so the cache fallback always wins the race
/// against the runner's execution limit.
const EXECUTION_MARGIN: Duration = Duration::from_secs(5);

/// Asks the UI for a fresh snapshot and waits on the session's mailbox.
///
/// The tool never fails for lack of an answer: after the timeout, or if the
/// mailbox closes, it returns the last snapshot it saw (empty on first use).
pub struct GetCanvasStateTool {
    mailbox: tokio::sync::Mutex<StateMailbox>,
    cache: Mutex<StateSnapshot>,
    timeout: Duration,
    phase: PhaseHandle,
}

impl GetCanvasStateTool {
    pub fn new(mailbox: StateMailbox, timeout: Duration) -> Self {
        Self {
            mailbox: tokio::sync::Mutex::new(mailbox),
            cache: Mutex::new(StateSnapshot::default()),
            timeout,
            phase: PhaseHandle::new(),
        }
    }

    /// Seed the cache, typically with the canvas sent alongside the prompt.
    pub fn with_cache(self, snapshot: StateSnapshot) -> Self {
        *self.cache.lock() = snapshot;
        self
    }

    pub fn with_phase(mut self, phase: PhaseHandle) -> Self {
        self.phase = phase;
        self
    }

    pub fn cached(&self) -> StateSnapshot {
        self.cache.lock().clone()
    }
}

#[async_trait]
impl Tool for GetCanvasStateTool {
    fn name(&self) -> &str {
        "get_canvas_state"
    }

    fn description(&self) -> &str {
        "Read the nodes and edges currently on the canvas"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn is_query(&self) -> bool {
        true
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout + EXECUTION_MARGIN)
    }

    async fn execute(&self, _args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let mut mailbox = self.mailbox.lock().await;

        // A report that arrived between requests is older than the one we are about to ask for.
        if let Some(stale) = mailbox.take_pending() {
            debug!("discarding stale snapshot");
            *self.cache.lock() = stale;
        }

        ctx.sink.emit(&ctx.session_id, CanvasEvent::StateRequest);
        self.phase.set(RunPhase::AwaitingStateSnapshot);

        let received = tokio::select! {
            _ = ctx.abort_signal.cancelled() => return Err(ToolError::Cancelled),
            r = mailbox.wait(self.timeout) => r,
        };
        self.phase.set(RunPhase::AwaitingToolResult);

        let snapshot = match received {
            MailboxRecv::Snapshot(snapshot) => {
                *self.cache.lock() = snapshot.clone();
                snapshot
            }
            MailboxRecv::TimedOut => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "no canvas state reported, using cache");
                self.cached()
            }
            MailboxRecv::Closed => {
                debug!("mailbox closed, using cache");
                self.cached()
            }
        };

        Ok(snapshot.to_json_string())
    }
}
