use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;

use easel_core::context::LlmContext;
use easel_core::errors::GatewayError;
use easel_core::ids::ToolCallId;
use easel_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use easel_core::provider::{LlmProvider, StreamEventStream, StreamOptions};
use easel_core::stream::StreamEvent;

/// Pre-programmed responses for deterministic testing without API calls.
pub enum MockResponse {
    /// Yield a sequence of StreamEvents.
    Stream(Vec<StreamEvent>),
    /// Return an error from the stream() call itself.
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
    /// Yield the events, then never end.
    Hang(Vec<StreamEvent>),
}

impl MockResponse {
    /// A plain text reply streamed as one delta per word.
    pub fn stream_text(text: &str) -> Self {
        let mut events = vec![StreamEvent::Start, StreamEvent::TextStart];
        events.extend(
            text.split_inclusive(' ')
                .map(|w| StreamEvent::TextDelta { delta: w.to_string() }),
        );
        events.push(StreamEvent::TextEnd { text: text.to_string() });
        events.push(StreamEvent::Done {
            message: AssistantMessage::text(text),
            stop_reason: StopReason::EndTurn,
        });
        Self::Stream(events)
    }

    /// A reply that is a single tool call and nothing else.
    pub fn tool_call(name: &str, args: Value) -> Self {
        Self::tool_calls(None, vec![(name, args)])
    }

    /// A reply with optional leading text followed by tool calls.
    pub fn tool_calls(text: Option<&str>, calls: Vec<(&str, Value)>) -> Self {
        let mut events = vec![StreamEvent::Start];
        let mut content = Vec::new();

        if let Some(text) = text {
            events.push(StreamEvent::TextStart);
            events.push(StreamEvent::TextDelta { delta: text.to_string() });
            events.push(StreamEvent::TextEnd { text: text.to_string() });
            content.push(AssistantContent::Text { text: text.to_string() });
        }

        for (name, arguments) in calls {
            let block = ToolCallBlock { id: ToolCallId::new(), name: name.to_string(), arguments };
            events.push(StreamEvent::ToolCallStart {
                tool_call_id: block.id.clone(),
                name: block.name.clone(),
            });
            events.push(StreamEvent::ToolCallEnd { tool_call: block.clone() });
            content.push(AssistantContent::ToolCall(block));
        }

        events.push(StreamEvent::Done {
            message: AssistantMessage { content, stop_reason: Some(StopReason::ToolUse) },
            stop_reason: StopReason::ToolUse,
        });
        Self::Stream(events)
    }

    /// A stream that fails after starting.
    pub fn stream_error(error: GatewayError) -> Self {
        Self::Stream(vec![StreamEvent::Start, StreamEvent::Error { error }])
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every context it was called with.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    contexts: Mutex<Vec<LlmContext>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            contexts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Contexts passed to each `stream()` call, in order.
    pub fn contexts(&self) -> Vec<LlmContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        context: &LlmContext,
        _options: &StreamOptions,
    ) -> Result<StreamEventStream, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().push(context.clone());

        let next = self.responses.lock().pop_front();
        let Some(response) = next else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<StreamEventStream, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Stream(events) => return Ok(Box::pin(stream::iter(events))),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Hang(events) => {
                return Ok(Box::pin(stream::iter(events).chain(stream::pending())));
            }
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
