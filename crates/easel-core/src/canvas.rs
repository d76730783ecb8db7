use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The UI-owned graph at one point in time. Nodes and edges are passed
/// through untouched; only the UI understands their shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default = "empty_array")]
    pub nodes: Value,
    #[serde(default = "empty_array")]
    pub edges: Value,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self { nodes: empty_array(), edges: empty_array() }
    }
}

impl StateSnapshot {
    pub fn new(nodes: Value, edges: Value) -> Self {
        Self {
            nodes: normalize(nodes),
            edges: normalize(edges),
        }
    }

    /// Build a snapshot from optional request fields; `None` when neither is present.
    pub fn from_parts(nodes: Option<Value>, edges: Option<Value>) -> Option<Self> {
        if nodes.is_none() && edges.is_none() {
            return None;
        }
        Some(Self::new(
            nodes.unwrap_or_else(empty_array),
            edges.unwrap_or_else(empty_array),
        ))
    }

    /// Compact JSON handed back to the model as a tool result.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"nodes":[],"edges":[]}"#.to_string())
    }

    /// Text injected into the transcript ahead of the user's prompt.
    pub fn to_context_text(&self) -> String {
        format!(
            "Current Canvas State:\nNodes: {}\nEdges: {}",
            self.nodes, self.edges
        )
    }
}

/// A UI that reports `null` for an empty graph means the same thing as `[]`.
fn normalize(value: Value) -> Value {
    if value.is_null() {
        empty_array()
    } else {
        value
    }
}

/// Node types the canvas can render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Text,
    Image,
    Video,
    Audio,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [Self::Text, Self::Image, Self::Video, Self::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_snapshot_is_empty_arrays() {
        let snap = StateSnapshot::default();
        assert_eq!(snap.to_json_string(), r#"{"nodes":[],"edges":[]}"#);
    }

    #[test]
    fn missing_fields_deserialize_to_empty() {
        let snap: StateSnapshot = serde_json::from_value(json!({"nodes": [{"id": "a"}]})).unwrap();
        assert_eq!(snap.edges, json!([]));
        assert_eq!(snap.nodes[0]["id"], "a");
    }

    #[test]
    fn null_parts_normalize_to_empty() {
        let snap = StateSnapshot::new(Value::Null, json!([{"source": "a", "target": "b"}]));
        assert_eq!(snap.nodes, json!([]));
        assert_eq!(snap.edges[0]["target"], "b");
    }

    #[test]
    fn from_parts_requires_at_least_one_side() {
        assert!(StateSnapshot::from_parts(None, None).is_none());
        let snap = StateSnapshot::from_parts(Some(json!([{"id": "x"}])), None).unwrap();
        assert_eq!(snap.edges, json!([]));
    }

    #[test]
    fn context_text_lists_nodes_and_edges() {
        let snap = StateSnapshot::new(json!([{"id": "n1"}]), json!([]));
        let text = snap.to_context_text();
        assert!(text.starts_with("Current Canvas State:\n"));
        assert!(text.contains(r#"Nodes: [{"id":"n1"}]"#));
        assert!(text.ends_with("Edges: []"));
    }

    #[test]
    fn node_kind_strings() {
        let names: Vec<&str> = NodeKind::ALL.iter().map(NodeKind::as_str).collect();
        assert_eq!(names, ["text", "image", "video", "audio"]);
        assert_eq!(serde_json::to_string(&NodeKind::Video).unwrap(), r#""video""#);
    }
}
