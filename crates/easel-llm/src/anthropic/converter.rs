use serde_json::{json, Value};

use easel_core::context::LlmContext;
use easel_core::messages::{AssistantContent, AssistantMessage, Message, ToolResultMessage};
use easel_core::provider::StreamOptions;

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Convert an LlmContext into a Messages API request body.
pub fn build_request_body(context: &LlmContext, options: &StreamOptions, model: &str) -> Value {
    let mut body = json!({
        "model": model,
        "stream": true,
        "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });

    if let Some(temp) = options.temperature {
        body["temperature"] = json!(temp);
    }

    if let Some(system) = context.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        body["system"] = json!(system);
    }

    body["messages"] = Value::Array(convert_messages(&context.messages));

    if context.has_tools() {
        let tools: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters_schema,
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    body
}

/// All results for one assistant turn must arrive in a single user message,
/// so consecutive tool results are folded together.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();

    for msg in messages {
        match msg {
            Message::User(user) => {
                result.push(json!({
                    "role": "user",
                    "content": [{"type": "text", "text": user.text}],
                }));
            }
            Message::Assistant(asst) => {
                if let Some(converted) = convert_assistant_message(asst) {
                    result.push(converted);
                }
            }
            Message::ToolResult(tr) => {
                let block = convert_tool_result(tr);
                let appended = result
                    .last_mut()
                    .filter(|last| last["role"] == "user" && is_tool_result_message(last))
                    .and_then(|last| last["content"].as_array_mut())
                    .map(|content| content.push(block.clone()))
                    .is_some();
                if !appended {
                    result.push(json!({"role": "user", "content": [block]}));
                }
            }
        }
    }

    result
}

fn is_tool_result_message(msg: &Value) -> bool {
    msg["content"]
        .as_array()
        .map(|blocks| blocks.iter().all(|b| b["type"] == "tool_result"))
        .unwrap_or(false)
}

fn convert_assistant_message(msg: &AssistantMessage) -> Option<Value> {
    let content: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|c| match c {
            AssistantContent::Text { text } if text.is_empty() => None,
            AssistantContent::Text { text } => Some(json!({"type": "text", "text": text})),
            AssistantContent::ToolCall(tc) => Some(json!({
                "type": "tool_use",
                "id": tc.id.as_str(),
                "name": tc.name,
                "input": tc.arguments,
            })),
        })
        .collect();

    (!content.is_empty()).then(|| json!({"role": "assistant", "content": content}))
}

fn convert_tool_result(msg: &ToolResultMessage) -> Value {
    let mut block = json!({
        "type": "tool_result",
        "tool_use_id": msg.tool_call_id.as_str(),
        "content": [{"type": "text", "text": msg.text}],
    });
    if msg.is_error {
        block["is_error"] = json!(true);
    }
    block
}
