use serde_json::{json, Value};

use easel_core::context::LlmContext;
use easel_core::messages::{AssistantContent, AssistantMessage, Message};
use easel_core::provider::StreamOptions;

/// Convert an LlmContext into a Chat Completions request body.
pub fn build_request_body(context: &LlmContext, options: &StreamOptions, model: &str) -> Value {
    let mut messages = Vec::with_capacity(context.messages.len() + 1);
    if let Some(system) = context.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(context.messages.iter().filter_map(convert_message));

    let mut body = json!({
        "model": model,
        "stream": true,
        "messages": messages,
    });

    if let Some(max) = options.max_tokens {
        body["max_completion_tokens"] = json!(max);
    }
    if let Some(temp) = options.temperature {
        body["temperature"] = json!(temp);
    }

    if context.has_tools() {
        let tools: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    },
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    body
}

fn convert_message(msg: &Message) -> Option<Value> {
    match msg {
        Message::User(user) => Some(json!({"role": "user", "content": user.text})),
        Message::Assistant(asst) => convert_assistant(asst),
        Message::ToolResult(tr) => Some(json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id.as_str(),
            "content": tr.text,
        })),
    }
}

/// Tool call arguments travel as a JSON-encoded string.
fn convert_assistant(msg: &AssistantMessage) -> Option<Value> {
    let text = msg.text_content();
    let tool_calls: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|c| match c {
            AssistantContent::ToolCall(tc) => Some(json!({
                "id": tc.id.as_str(),
                "type": "function",
                "function": {
                    "name": tc.name,
                    "arguments": tc.arguments.to_string(),
                },
            })),
            AssistantContent::Text { .. } => None,
        })
        .collect();

    if text.is_empty() && tool_calls.is_empty() {
        return None;
    }

    let mut out = json!({"role": "assistant"});
    out["content"] = if text.is_empty() { Value::Null } else { json!(text) };
    if !tool_calls.is_empty() {
        out["tool_calls"] = Value::Array(tool_calls);
    }
    Some(out)
}
