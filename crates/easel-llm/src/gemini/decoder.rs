use serde::Deserialize;
use serde_json::Value;

use easel_core::errors::GatewayError;
use easel_core::ids::ToolCallId;
use easel_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use easel_core::stream::StreamEvent;

use crate::sse::SseDecoder;

/// Gemini sends whole function calls in one part and never assigns ids,
/// so each call gets a fresh [`ToolCallId`].
#[derive(Default)]
pub struct GeminiDecoder {
    started: bool,
    text: String,
    text_open: bool,
    tool_calls: Vec<ToolCallBlock>,
    finish_reason: Option<String>,
    done: bool,
}

impl GeminiDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_part(&mut self, part: Part, events: &mut Vec<StreamEvent>) {
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            if part.thought == Some(true) {
                return;
            }
            if !self.text_open {
                self.text_open = true;
                events.push(StreamEvent::TextStart);
            }
            self.text.push_str(&text);
            events.push(StreamEvent::TextDelta { delta: text });
        } else if let Some(call) = part.function_call {
            let id = ToolCallId::new();
            let arguments = match call.args {
                Value::Object(map) => Value::Object(map),
                _ => Value::Object(Default::default()),
            };
            events.push(StreamEvent::ToolCallStart { tool_call_id: id.clone(), name: call.name.clone() });
            events.push(StreamEvent::ToolCallDelta {
                tool_call_id: id.clone(),
                arguments_delta: arguments.to_string(),
            });
            let block = ToolCallBlock { id, name: call.name, arguments };
            events.push(StreamEvent::ToolCallEnd { tool_call: block.clone() });
            self.tool_calls.push(block);
        }
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
        content.extend(self.tool_calls.drain(..).map(AssistantContent::ToolCall));

        let mut message = AssistantMessage { content, stop_reason: None };
        // Gemini reports STOP even when the reply is a function call.
        let stop_reason = if message.has_tool_calls() {
            StopReason::ToolUse
        } else {
            StopReason::from_provider(self.finish_reason.as_deref().unwrap_or("STOP"))
        };
        message.stop_reason = Some(stop_reason.clone());
        events.push(StreamEvent::Done { message, stop_reason });
        events
    }
}

impl SseDecoder for GeminiDecoder {
    fn decode(&mut self, _event_type: &str, data: &str) -> Vec<StreamEvent> {
        if self.done || data.trim().is_empty() {
            return Vec::new();
        }
        let chunk: Chunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                return vec![StreamEvent::Error {
                    error: GatewayError::StreamInterrupted(format!("malformed chunk: {e}")),
                }]
            }
        };

        if let Some(err) = chunk.error {
            self.done = true;
            return vec![StreamEvent::Error { error: classify_error(&err) }];
        }

        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start);
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return events;
        };
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            self.on_part(part, &mut events);
        }

        if let Some(reason) = candidate.finish_reason {
            if reason == "SAFETY" || reason == "RECITATION" {
                self.done = true;
                events.push(StreamEvent::Error {
                    error: GatewayError::InvalidRequest(format!("response blocked: {reason}")),
                });
                return events;
            }
            self.finish_reason = Some(reason);
            events.extend(self.complete());
        }
        events
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        if self.started {
            return self.complete();
        }
        vec![StreamEvent::Error {
            error: GatewayError::StreamInterrupted("stream ended without content".into()),
        }]
    }
}

fn classify_error(err: &ApiError) -> GatewayError {
    match err.code {
        code @ 400..=599 => GatewayError::from_status(code, err.message.clone()),
        _ => GatewayError::ServerError { status: 500, body: err.message.clone() },
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    thought: Option<bool>,
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}
