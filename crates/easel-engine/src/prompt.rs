use easel_core::canvas::StateSnapshot;
use easel_core::messages::{ConversationTurn, Message};

/// Standing instructions for the canvas agent.
pub const SYSTEM_PROMPT: &str = "\
You are a canvas builder. You turn the user's request into nodes, edges and \
groups on a visual canvas by calling tools. Act, do not ask: when a request is \
underspecified, pick sensible defaults and build it.

Tools:
- get_canvas_state: read the nodes and edges currently on the canvas.
- add_node: create a node of type text, image, video or audio.
- connect_nodes: draw an edge from a source node to a target node.
- create_group: put several nodes under one labelled group.
- delete_node: remove a node.

Order of work:
1. If the request refers to existing content, call get_canvas_state first.
2. Create every node you need.
3. Connect them.
4. Group related nodes last, when grouping helps.

Layout:
- Place the first node at x=100, y=100.
- Step 300 along x for each node in the same row, and 250 along y for a new row.
- Never reuse the coordinates of an existing node.
- Give every node a short unique id such as text-1 or image-2.

Text nodes carry their words in `content`. Media nodes carry a generation \
description in `prompt`. Mark nodes that feed others with is_source=true.

When you are done, reply with one or two sentences describing what you built, \
in the same language the user wrote in.";

/// Assemble the turns that follow the system prompt: prior history, then the
/// canvas as it stood when the run started, then the new request.
pub fn build_transcript(
    history: &[ConversationTurn],
    initial: Option<&StateSnapshot>,
    prompt: &str,
) -> Vec<Message> {
    let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
    if let Some(snapshot) = initial {
        messages.push(Message::user_text(snapshot.to_context_text()));
    }
    messages.push(Message::user_text(prompt));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_text(msg: &Message) -> &str {
        match msg {
            Message::User(u) => &u.text,
            other => panic!("expected user message, got {other:?}"),
        }
    }

    #[test]
    fn prompt_only() {
        let messages = build_transcript(&[], None, "draw a cat");
        assert_eq!(messages.len(), 1);
        assert_eq!(user_text(&messages[0]), "draw a cat");
    }

    #[test]
    fn history_then_state_then_prompt() {
        let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
        let snapshot = StateSnapshot::new(json!([{"id": "n1"}]), json!([]));
        let messages = build_transcript(&history, Some(&snapshot), "add another");

        assert_eq!(messages.len(), 4);
        assert_eq!(user_text(&messages[0]), "hi");
        assert!(matches!(&messages[1], Message::Assistant(a) if a.text_content() == "hello"));
        assert!(user_text(&messages[2]).starts_with("Current Canvas State:"));
        assert_eq!(user_text(&messages[3]), "add another");
    }

    #[test]
    fn system_prompt_names_every_tool() {
        for tool in ["get_canvas_state", "add_node", "connect_nodes", "create_group", "delete_node"] {
            assert!(SYSTEM_PROMPT.contains(tool), "{tool}");
        }
    }
}
