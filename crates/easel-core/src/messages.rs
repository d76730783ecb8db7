use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;

/// One entry of the model-facing transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "user")]
    User(UserMessage),
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResultMessage),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: Vec<AssistantContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: ToolCallId,
    /// Name of the tool that produced this result. Gemini correlates by name, not id.
    pub tool_name: String,
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallBlock),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Map a provider-specific finish reason onto the shared vocabulary.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "tool_use" | "tool_calls" | "function_call" => Self::ToolUse,
            "max_tokens" | "length" | "MAX_TOKENS" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            _ => Self::EndTurn,
        }
    }
}

/// Speaker of a caller-supplied history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A prior exchange handed in by the caller. Never mutated by the runner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => Message::user_text(&turn.content),
            TurnRole::Assistant => Message::assistant_text(&turn.content),
        }
    }
}

// --- Convenience constructors ---

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User(UserMessage { text: text.into() })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage::text(text))
    }

    pub fn tool_result(
        tool_call_id: ToolCallId,
        tool_name: impl Into<String>,
        text: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Message::ToolResult(ToolResultMessage {
            tool_call_id,
            tool_name: tool_name.into(),
            text: text.into(),
            is_error,
        })
    }
}

impl AssistantMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![AssistantContent::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallBlock> {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, AssistantContent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_text_message() {
        let msg = Message::user_text("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn tool_result_carries_name_and_id() {
        let id = ToolCallId::from_raw("call_1");
        let msg = Message::tool_result(id, "add_node", "Node a added", false);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool_result");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["tool_name"], "add_node");
        assert_eq!(json["is_error"], false);
    }

    #[test]
    fn assistant_tool_calls_extracted() {
        let tc = ToolCallBlock {
            id: ToolCallId::new(),
            name: "add_node".into(),
            arguments: json!({"id": "n1"}),
        };
        let msg = AssistantMessage {
            content: vec![
                AssistantContent::Text { text: "adding ".into() },
                AssistantContent::Text { text: "a node".into() },
                AssistantContent::ToolCall(tc),
            ],
            stop_reason: Some(StopReason::ToolUse),
        };
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.tool_calls()[0].name, "add_node");
        assert_eq!(msg.text_content(), "adding a node");
    }

    #[test]
    fn plain_text_has_no_tool_calls() {
        let msg = AssistantMessage::text("done");
        assert!(!msg.has_tool_calls());
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn conversation_turn_maps_to_message_role() {
        let user: Message = (&ConversationTurn::user("hi")).into();
        assert!(matches!(user, Message::User(ref u) if u.text == "hi"));

        let assistant: Message = (&ConversationTurn::assistant("hello")).into();
        match assistant {
            Message::Assistant(a) => assert_eq!(a.text_content(), "hello"),
            other => panic!("expected assistant, got {other:?}"),
        }
    }

    #[test]
    fn turn_role_wire_format() {
        let turn: ConversationTurn =
            serde_json::from_value(json!({"role": "assistant", "content": "x"})).unwrap();
        assert_eq!(turn.role, TurnRole::Assistant);
        assert!(serde_json::from_value::<ConversationTurn>(json!({"role": "system", "content": "x"})).is_err());
    }

    #[test]
    fn stop_reason_from_provider_strings() {
        assert_eq!(StopReason::from_provider("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_provider("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_provider("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_provider("MAX_TOKENS"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_provider("STOP"), StopReason::EndTurn);
        assert_eq!(StopReason::from_provider("end_turn"), StopReason::EndTurn);
    }
}
