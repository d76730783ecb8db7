use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use easel_core::canvas::StateSnapshot;
use easel_core::context::LlmContext;
use easel_core::errors::GatewayError;
use easel_core::events::{CanvasEvent, EventSink};
use easel_core::ids::SessionId;
use easel_core::messages::{AssistantMessage, ConversationTurn, Message, ToolCallBlock};
use easel_core::phase::RunPhase;
use easel_core::provider::{LlmProvider, StreamOptions};
use easel_core::stream::StreamEvent;
use easel_core::tools::{ToolContext, ToolError};

use crate::error::EngineError;
use crate::format::tool_result_message;
use crate::phase::PhaseHandle;
use crate::prompt::{build_transcript, SYSTEM_PROMPT};
use crate::registry::ToolRegistry;
use crate::schema;

pub const DEFAULT_MAX_ITERATIONS: u32 = 15;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Everything one run needs besides its inputs.
pub struct AgentConfig {
    pub provider: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub system_prompt: String,
    pub max_iterations: u32,
    pub tool_timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopKind {
    /// The model answered without requesting tools.
    Completed,
    /// The iteration cap was reached while the model still wanted tools.
    IterationCap,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub iterations: u32,
    pub stop: StopKind,
    pub final_text: String,
}

/// Drives one prompt through the model and the canvas tools until the model
/// stops asking for tools or the iteration cap is hit.
pub struct AgentRunner {
    session_id: SessionId,
    config: AgentConfig,
    phase: PhaseHandle,
}

impl AgentRunner {
    pub fn new(session_id: SessionId, config: AgentConfig) -> Self {
        Self { session_id, config, phase: PhaseHandle::new() }
    }

    pub fn with_phase(mut self, phase: PhaseHandle) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> &PhaseHandle {
        &self.phase
    }

    /// Run to completion. Emits exactly one `done` or `error` on `sink`.
    #[instrument(skip_all, fields(session_id = %self.session_id, provider = self.config.provider.name(), model = self.config.provider.model()))]
    pub async fn run(
        &self,
        prompt: &str,
        history: &[ConversationTurn],
        initial: Option<&StateSnapshot>,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        self.phase.set(RunPhase::Running);
        let messages = build_transcript(history, initial, prompt);

        match self.run_loop(messages, &sink, cancel).await {
            Ok(outcome) => {
                info!(iterations = outcome.iterations, stop = ?outcome.stop, "run finished");
                sink.emit(&self.session_id, CanvasEvent::Done);
                self.phase.set(RunPhase::Done);
                Ok(outcome)
            }
            Err(e) => {
                match &e {
                    EngineError::Cancelled => info!("run cancelled"),
                    other => error!(
                        error = %other,
                        kind = other.error_kind(),
                        retryable = other.is_retryable(),
                        "run failed"
                    ),
                }
                sink.emit(&self.session_id, CanvasEvent::Error { message: e.to_string() });
                self.phase.set(RunPhase::Error);
                Err(e)
            }
        }
    }

    async fn run_loop(
        &self,
        mut messages: Vec<Message>,
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let max = self.config.max_iterations;
        let mut final_text = String::new();

        for iteration in 1..=max {
            debug!(iteration, messages = messages.len(), "model turn");
            let reply = self.stream_turn(&messages, sink, cancel).await?;
            final_text = reply.text_content();

            let tool_calls: Vec<ToolCallBlock> = reply.tool_calls().into_iter().cloned().collect();
            messages.push(Message::Assistant(reply));

            if tool_calls.is_empty() {
                return Ok(RunOutcome { iterations: iteration, stop: StopKind::Completed, final_text });
            }

            for call in &tool_calls {
                let result = self.dispatch(call, sink, cancel).await?;
                messages.push(result);
            }
            self.phase.set(RunPhase::Running);
        }

        warn!(max_iterations = max, "iteration cap reached, stopping");
        Ok(RunOutcome { iterations: max, stop: StopKind::IterationCap, final_text })
    }

    /// One model call, forwarding text fragments as they arrive.
    async fn stream_turn(
        &self,
        messages: &[Message],
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<AssistantMessage, EngineError> {
        self.phase.set(RunPhase::Streaming);

        let context = LlmContext {
            system_prompt: Some(self.config.system_prompt.clone()),
            messages: messages.to_vec(),
            tools: self.config.tools.definitions(),
        };
        let options = StreamOptions { max_tokens: self.config.max_tokens, temperature: None };

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            r = self.config.provider.stream(&context, &options) => r?,
        };

        let mut streamed_text = false;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                e = stream.next() => e,
            };
            match event {
                Some(StreamEvent::TextDelta { delta }) => {
                    if !delta.is_empty() {
                        streamed_text = true;
                        sink.emit(&self.session_id, CanvasEvent::Content { delta });
                    }
                }
                Some(StreamEvent::Done { message, .. }) => {
                    let text = message.text_content();
                    if !streamed_text && !text.is_empty() {
                        sink.emit(&self.session_id, CanvasEvent::Content { delta: text });
                    }
                    return Ok(message);
                }
                Some(StreamEvent::Error { error: GatewayError::Cancelled }) => {
                    return Err(EngineError::Cancelled);
                }
                Some(StreamEvent::Error { error }) => return Err(error.into()),
                Some(_) => {}
                None => {
                    return Err(GatewayError::StreamInterrupted("stream ended without a final message".into()).into());
                }
            }
        }
    }

    /// Execute one tool call and render its outcome for the transcript.
    /// Only cancellation is fatal; every other failure goes back to the model.
    #[instrument(skip_all, fields(tool = %call.name, tool_call_id = %call.id))]
    async fn dispatch(
        &self,
        call: &ToolCallBlock,
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> Result<Message, EngineError> {
        self.phase.set(RunPhase::AwaitingToolResult);

        let Some(tool) = self.config.tools.get(&call.name) else {
            warn!("model requested unknown tool");
            return Ok(tool_result_message(call, false, Err(format!("unknown tool: {}", call.name))));
        };
        let is_query = tool.is_query();

        if let Err(reason) = schema::validate(&tool.parameters_schema(), &call.arguments) {
            debug!(%reason, "rejected tool arguments");
            return Ok(tool_result_message(call, is_query, Err(format!("invalid arguments: {reason}"))));
        }

        let ctx = ToolContext {
            session_id: self.session_id.clone(),
            sink: Arc::clone(sink),
            abort_signal: cancel.child_token(),
        };
        let timeout = tool.timeout().unwrap_or(self.config.tool_timeout);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            r = tokio::time::timeout(
                timeout,
                std::panic::AssertUnwindSafe(tool.execute(call.arguments.clone(), &ctx)).catch_unwind(),
            ) => r,
        };

        let outcome = match result {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(ToolError::Cancelled))) => return Err(EngineError::Cancelled),
            Ok(Ok(Err(e))) => {
                debug!(error = %e, "tool returned error");
                Err(e.to_string())
            }
            Ok(Err(panic)) => {
                error!(panic = %panic_message(&panic), "tool panicked during execution");
                Err("internal error: tool crashed".to_string())
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "tool timed out");
                Err(ToolError::Timeout(timeout).to_string())
            }
        };

        Ok(tool_result_message(call, is_query, outcome))
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
