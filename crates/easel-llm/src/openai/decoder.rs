use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use easel_core::errors::GatewayError;
use easel_core::ids::ToolCallId;
use easel_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use easel_core::stream::StreamEvent;

use crate::sse::SseDecoder;

const DONE_SENTINEL: &str = "[DONE]";

/// Assembles Chat Completions chunks. Tool calls arrive keyed by `index`;
/// the id and name come on the first fragment only.
#[derive(Default)]
pub struct OpenAiDecoder {
    started: bool,
    text: String,
    text_open: bool,
    tools: BTreeMap<u32, PartialCall>,
    finish_reason: Option<String>,
    done: bool,
}

struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl OpenAiDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_chunk(&mut self, chunk: Chunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start);
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            if !self.text_open {
                self.text_open = true;
                events.push(StreamEvent::TextStart);
            }
            self.text.push_str(&content);
            events.push(StreamEvent::TextDelta { delta: content });
        }

        for call in choice.delta.tool_calls.unwrap_or_default() {
            let entry = self.tools.entry(call.index).or_insert_with(|| PartialCall {
                id: String::new(),
                name: String::new(),
                arguments: String::new(),
            });
            let function = call.function.unwrap_or_default();
            let is_new = entry.id.is_empty() && call.id.is_some();
            if let Some(id) = call.id {
                entry.id = id;
            }
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if is_new {
                events.push(StreamEvent::ToolCallStart {
                    tool_call_id: ToolCallId::from_raw(entry.id.as_str()),
                    name: entry.name.clone(),
                });
            }
            if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
                entry.arguments.push_str(&args);
                events.push(StreamEvent::ToolCallDelta {
                    tool_call_id: ToolCallId::from_raw(entry.id.as_str()),
                    arguments_delta: args,
                });
            }
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }
        events
    }

    fn complete(&mut self) -> Vec<StreamEvent> {
        self.done = true;
        let mut events = Vec::new();
        let mut content = Vec::new();

        if self.text_open {
            events.push(StreamEvent::TextEnd { text: self.text.clone() });
        }
        if !self.text.is_empty() {
            content.push(AssistantContent::Text { text: self.text.clone() });
        }

        for call in std::mem::take(&mut self.tools).into_values() {
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments).unwrap_or(Value::Object(Default::default()))
            };
            let id = if call.id.is_empty() { ToolCallId::new() } else { ToolCallId::from_raw(call.id) };
            let block = ToolCallBlock {
                id,
                name: call.name,
                arguments,
            };
            events.push(StreamEvent::ToolCallEnd { tool_call: block.clone() });
            content.push(AssistantContent::ToolCall(block));
        }

        let mut message = AssistantMessage { content, stop_reason: None };
        let stop_reason = match self.finish_reason.as_deref() {
            Some(reason) => StopReason::from_provider(reason),
            None if message.has_tool_calls() => StopReason::ToolUse,
            None => StopReason::EndTurn,
        };
        message.stop_reason = Some(stop_reason.clone());
        events.push(StreamEvent::Done { message, stop_reason });
        events
    }
}

impl SseDecoder for OpenAiDecoder {
    fn decode(&mut self, _event_type: &str, data: &str) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        let data = data.trim();
        if data == DONE_SENTINEL {
            return self.complete();
        }
        if data.is_empty() {
            return Vec::new();
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return vec![StreamEvent::Error {
                    error: GatewayError::StreamInterrupted(format!("malformed chunk: {e}")),
                }]
            }
        };
        if let Some(err) = value.get("error") {
            let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return vec![StreamEvent::Error {
                error: GatewayError::ServerError { status: 500, body: message.to_string() },
            }];
        }

        match serde_json::from_value::<Chunk>(value) {
            Ok(chunk) => self.on_chunk(chunk),
            Err(_) => Vec::new(),
        }
    }

    /// Some compatible servers close without `[DONE]`; a seen finish reason
    /// still counts as a complete reply.
    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        if self.finish_reason.is_some() {
            return self.complete();
        }
        vec![StreamEvent::Error {
            error: GatewayError::StreamInterrupted("stream ended without finish_reason".into()),
        }]
    }
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Default, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
