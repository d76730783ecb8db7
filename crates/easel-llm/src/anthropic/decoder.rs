use serde::Deserialize;
use serde_json::Value;

use easel_core::errors::GatewayError;
use easel_core::ids::ToolCallId;
use easel_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use easel_core::stream::StreamEvent;

use crate::sse::SseDecoder;

/// State machine for the Messages API event stream.
#[derive(Default)]
pub struct AnthropicDecoder {
    blocks: Vec<Block>,
    current: Option<usize>,
    stop_reason: Option<String>,
}

enum Block {
    Text(String),
    Tool { id: String, name: String, arguments_json: String },
}

impl AnthropicDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_block(&mut self) -> Option<&mut Block> {
        self.current.and_then(|idx| self.blocks.get_mut(idx))
    }

    fn block_start(&mut self, data: &str) -> Vec<StreamEvent> {
        let Ok(start) = serde_json::from_str::<ContentBlockStartEvent>(data) else {
            return Vec::new();
        };
        let block = &start.content_block;
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                self.push_block(Block::Text(String::new()));
                vec![StreamEvent::TextStart]
            }
            Some("tool_use") => {
                let id = str_field(block, "id");
                let name = str_field(block, "name");
                self.push_block(Block::Tool {
                    id: id.clone(),
                    name: name.clone(),
                    arguments_json: String::new(),
                });
                vec![StreamEvent::ToolCallStart { tool_call_id: ToolCallId::from_raw(id), name }]
            }
            _ => {
                self.current = None;
                Vec::new()
            }
        }
    }

    fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
        self.current = Some(self.blocks.len() - 1);
    }

    fn block_delta(&mut self, data: &str) -> Vec<StreamEvent> {
        let Ok(event) = serde_json::from_str::<ContentBlockDeltaEvent>(data) else {
            return Vec::new();
        };
        let delta = &event.delta;
        match (delta.get("type").and_then(Value::as_str), self.current_block()) {
            (Some("text_delta"), Some(Block::Text(text))) => {
                let piece = str_field(delta, "text");
                text.push_str(&piece);
                vec![StreamEvent::TextDelta { delta: piece }]
            }
            (Some("input_json_delta"), Some(Block::Tool { id, arguments_json, .. })) => {
                let partial = str_field(delta, "partial_json");
                arguments_json.push_str(&partial);
                vec![StreamEvent::ToolCallDelta {
                    tool_call_id: ToolCallId::from_raw(id.as_str()),
                    arguments_delta: partial,
                }]
            }
            _ => Vec::new(),
        }
    }

    fn block_stop(&mut self) -> Vec<StreamEvent> {
        let event = match self.current_block() {
            Some(Block::Text(text)) => Some(StreamEvent::TextEnd { text: text.clone() }),
            Some(block @ Block::Tool { .. }) => {
                tool_call_of(block).map(|tool_call| StreamEvent::ToolCallEnd { tool_call })
            }
            None => None,
        };
        self.current = None;
        event.into_iter().collect()
    }

    fn build_message(&self) -> AssistantMessage {
        let content = self
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Text(text) => Some(AssistantContent::Text { text: text.clone() }),
                Block::Tool { .. } => tool_call_of(block).map(AssistantContent::ToolCall),
            })
            .collect();
        AssistantMessage { content, stop_reason: None }
    }

    fn stop_reason(&self, message: &AssistantMessage) -> StopReason {
        match self.stop_reason.as_deref() {
            Some(reason) => StopReason::from_provider(reason),
            None if message.has_tool_calls() => StopReason::ToolUse,
            None => StopReason::EndTurn,
        }
    }
}

impl SseDecoder for AnthropicDecoder {
    fn decode(&mut self, event_type: &str, data: &str) -> Vec<StreamEvent> {
        match event_type {
            "message_start" => vec![StreamEvent::Start],
            "content_block_start" => self.block_start(data),
            "content_block_delta" => self.block_delta(data),
            "content_block_stop" => self.block_stop(),
            "message_delta" => {
                if let Ok(delta) = serde_json::from_str::<MessageDeltaEvent>(data) {
                    if let Some(reason) = delta.delta.stop_reason {
                        self.stop_reason = Some(reason);
                    }
                }
                Vec::new()
            }
            "message_stop" => {
                let mut message = self.build_message();
                let stop_reason = self.stop_reason(&message);
                message.stop_reason = Some(stop_reason.clone());
                vec![StreamEvent::Done { message, stop_reason }]
            }
            "error" => {
                let error = serde_json::from_str::<ErrorEvent>(data)
                    .map(|e| classify_error(&e.error))
                    .unwrap_or_else(|_| GatewayError::StreamInterrupted(data.to_string()));
                vec![StreamEvent::Error { error }]
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        vec![StreamEvent::Error {
            error: GatewayError::StreamInterrupted("stream ended before message_stop".into()),
        }]
    }
}

/// Malformed argument JSON degrades to an empty object so the tool layer can
/// report the missing fields.
fn tool_call_of(block: &Block) -> Option<ToolCallBlock> {
    match block {
        Block::Tool { id, name, arguments_json } => {
            let arguments = if arguments_json.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(arguments_json).unwrap_or(Value::Object(Default::default()))
            };
            Some(ToolCallBlock { id: ToolCallId::from_raw(id.as_str()), name: name.clone(), arguments })
        }
        Block::Text(_) => None,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn classify_error(err: &ErrorPayload) -> GatewayError {
    match err.error_type.as_str() {
        "overloaded_error" => GatewayError::ProviderOverloaded,
        "rate_limit_error" => GatewayError::RateLimited { retry_after: None },
        "authentication_error" | "permission_error" => {
            GatewayError::AuthenticationFailed(err.message.clone())
        }
        "invalid_request_error" | "not_found_error" => GatewayError::InvalidRequest(err.message.clone()),
        _ => GatewayError::ServerError { status: 500, body: err.message.clone() },
    }
}

#[derive(Deserialize)]
struct ContentBlockStartEvent {
    content_block: Value,
}

#[derive(Deserialize)]
struct ContentBlockDeltaEvent {
    delta: Value,
}

#[derive(Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDeltaPayload,
}

#[derive(Deserialize)]
struct MessageDeltaPayload {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
