//! Rendering of tool outcomes into the text the model reads back.

use serde_json::Value;

use easel_core::messages::{Message, ToolCallBlock};

/// Escape text placed between the result tags.
pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value for use inside a double-quoted attribute.
pub fn escape_attr(raw: &str) -> String {
    escape_text(raw).replace('"', "&quot;")
}

/// `<tool_result name=".." status="ok|error" args="..">outcome</tool_result>`
pub fn wrap_result(name: &str, ok: bool, args: &Value, outcome: &str) -> String {
    format!(
        r#"<tool_result name="{}" status="{}" args="{}">{}</tool_result>"#,
        escape_attr(name),
        if ok { "ok" } else { "error" },
        escape_attr(&args.to_string()),
        escape_text(outcome)
    )
}

/// Build the transcript entry for one tool call. Successful query results
/// are passed through unwrapped.
pub fn tool_result_message(call: &ToolCallBlock, is_query: bool, outcome: Result<String, String>) -> Message {
    let (text, is_error) = match outcome {
        Ok(text) if is_query => (text, false),
        Ok(text) => (wrap_result(&call.name, true, &call.arguments, &text), false),
        Err(message) => (wrap_result(&call.name, false, &call.arguments, &message), true),
    };
    Message::tool_result(call.id.clone(), call.name.clone(), text, is_error)
}
