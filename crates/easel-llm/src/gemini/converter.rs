use serde_json::{json, Map, Value};

use easel_core::context::LlmContext;
use easel_core::messages::{AssistantContent, Message};
use easel_core::provider::StreamOptions;

/// Convert an LlmContext into a `streamGenerateContent` request body.
pub fn build_request_body(context: &LlmContext, options: &StreamOptions) -> Value {
    let mut body = json!({ "contents": convert_contents(&context.messages) });

    if let Some(system) = context.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    if context.has_tools() {
        let declarations: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                let mut decl = json!({"name": t.name, "description": t.description});
                if has_properties(&t.parameters_schema) {
                    decl["parameters"] = t.parameters_schema.clone();
                }
                decl
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    let mut config = Map::new();
    if let Some(max) = options.max_tokens {
        config.insert("maxOutputTokens".into(), json!(max));
    }
    if let Some(temp) = options.temperature {
        config.insert("temperature".into(), json!(temp));
    }
    if !config.is_empty() {
        body["generationConfig"] = Value::Object(config);
    }

    body
}

/// The API rejects an object schema with an empty `properties` map.
fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

fn convert_contents(messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();

    for msg in messages {
        match msg {
            Message::User(user) => {
                contents.push(json!({"role": "user", "parts": [{"text": user.text}]}));
            }
            Message::Assistant(asst) => {
                let parts: Vec<Value> = asst
                    .content
                    .iter()
                    .filter_map(|c| match c {
                        AssistantContent::Text { text } if text.is_empty() => None,
                        AssistantContent::Text { text } => Some(json!({"text": text})),
                        AssistantContent::ToolCall(tc) => Some(json!({
                            "functionCall": {"name": tc.name, "args": tc.arguments},
                        })),
                    })
                    .collect();
                if !parts.is_empty() {
                    contents.push(json!({"role": "model", "parts": parts}));
                }
            }
            Message::ToolResult(tr) => {
                let part = json!({
                    "functionResponse": {
                        "name": tr.tool_name,
                        "response": {"content": tr.text},
                    },
                });
                let merged = contents
                    .last_mut()
                    .filter(|last| last["role"] == "user" && is_function_response(last))
                    .and_then(|last| last["parts"].as_array_mut())
                    .map(|parts| parts.push(part.clone()))
                    .is_some();
                if !merged {
                    contents.push(json!({"role": "user", "parts": [part]}));
                }
            }
        }
    }

    contents
}

fn is_function_response(content: &Value) -> bool {
    content["parts"]
        .as_array()
        .is_some_and(|parts| parts.iter().all(|p| p.get("functionResponse").is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::ids::ToolCallId;
    use easel_core::messages::{AssistantMessage, ToolCallBlock};
    use easel_core::tools::ToolDefinition;

    #[test]
    fn roles_map_to_user_and_model() {
        let contents = convert_contents(&[Message::user_text("hi"), Message::assistant_text("hello")]);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "hello");
    }

    #[test]
    fn function_round_trip_shapes() {
        let contents = convert_contents(&[
            Message::user_text("go"),
            Message::Assistant(AssistantMessage {
                content: vec![
                    AssistantContent::ToolCall(ToolCallBlock {
                        id: ToolCallId::new(),
                        name: "add_node".into(),
                        arguments: json!({"id": "a"}),
                    }),
                    AssistantContent::ToolCall(ToolCallBlock {
                        id: ToolCallId::new(),
                        name: "get_canvas_state".into(),
                        arguments: json!({}),
                    }),
                ],
                stop_reason: None,
            }),
            Message::tool_result(ToolCallId::new(), "add_node", "Node a added", false),
            Message::tool_result(ToolCallId::new(), "get_canvas_state", "{}", false),
        ]);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["id"], "a");
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["functionResponse"]["name"], "get_canvas_state");
        assert_eq!(responses[0]["functionResponse"]["response"]["content"], "Node a added");
    }

    #[test]
    fn empty_parameter_schema_omitted() {
        let context = LlmContext {
            system_prompt: Some("sys".into()),
            tools: vec![
                ToolDefinition {
                    name: "get_canvas_state".into(),
                    description: "Read".into(),
                    parameters_schema: json!({"type": "object", "properties": {}}),
                },
                ToolDefinition {
                    name: "delete_node".into(),
                    description: "Delete".into(),
                    parameters_schema: json!({"type": "object", "properties": {"id": {"type": "string"}}}),
                },
            ],
            ..Default::default()
        };
        let body = build_request_body(&context, &StreamOptions::default());
        let decls = &body["tools"][0]["functionDeclarations"];
        assert!(decls[0].get("parameters").is_none());
        assert_eq!(decls[1]["parameters"]["properties"]["id"]["type"], "string");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn generation_config_from_options() {
        let opts = StreamOptions { max_tokens: Some(100), temperature: Some(0.5) };
        let body = build_request_body(&LlmContext::empty(), &opts);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 100);
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
    }
}
