use crate::errors::GatewayError;
use crate::ids::ToolCallId;
use crate::messages::{AssistantMessage, StopReason, ToolCallBlock};

/// Events emitted while a chat model streams one reply. Ordering contract:
///
/// Start → (TextStart → TextDelta* → TextEnd | ToolCallStart → ToolCallDelta* → ToolCallEnd)* → Done
///
/// Error can appear at any point and ends the stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Start,

    TextStart,
    TextDelta { delta: String },
    TextEnd { text: String },

    ToolCallStart { tool_call_id: ToolCallId, name: String },
    ToolCallDelta { tool_call_id: ToolCallId, arguments_delta: String },
    ToolCallEnd { tool_call: ToolCallBlock },

    Done { message: AssistantMessage, stop_reason: StopReason },
    Error { error: GatewayError },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        let done = StreamEvent::Done {
            message: AssistantMessage::text("hi"),
            stop_reason: StopReason::EndTurn,
        };
        assert!(done.is_terminal());
        assert!(StreamEvent::Error { error: GatewayError::Cancelled }.is_terminal());
        assert!(!StreamEvent::TextDelta { delta: "x".into() }.is_terminal());
    }
}
