use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use easel_core::canvas::NodeKind;
use easel_core::tools::{Tool, ToolContext, ToolError};

use super::{emit_tool, parse_args, require_id};

#[derive(Debug, Deserialize, Serialize)]
pub struct AddNodeArgs {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_source: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub struct AddNodeTool;

#[async_trait]
impl Tool for AddNodeTool {
    fn name(&self) -> &str {
        "add_node"
    }

    fn description(&self) -> &str {
        "Add a text, image, video or audio node to the canvas at the given position"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["type", "id", "x", "y"],
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["text", "image", "video", "audio"],
                    "description": "Kind of node"
                },
                "id": { "type": "string", "description": "Unique node id" },
                "x": { "type": "number", "description": "Horizontal position" },
                "y": { "type": "number", "description": "Vertical position" },
                "content": { "type": "string", "description": "Text body for text nodes" },
                "prompt": { "type": "string", "description": "Generation prompt for media nodes" },
                "is_source": { "type": "boolean", "description": "Whether this node feeds other nodes" },
                "label": { "type": "string", "description": "Display label" }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: AddNodeArgs = parse_args(args)?;
        require_id("id", &args.id)?;

        debug!(id = %args.id, kind = args.kind.as_str(), "add_node");
        emit_tool(ctx, self.name(), &args)?;
        Ok(format!("Node {} added", args.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil;
    use easel_core::events::CanvasEvent;
    use serde_json::json;

    #[tokio::test]
    async fn emits_event_then_returns_result() {
        let (ctx, sink) = testutil::ctx();
        let result = AddNodeTool
            .execute(json!({"type": "text", "id": "text-1", "x": 100, "y": 100, "content": "Hello"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result, "Node text-1 added");
        let events = sink.events_for(&ctx.session_id);
        assert_eq!(
            events,
            vec![CanvasEvent::Tool {
                name: "add_node".into(),
                args: json!({"type": "text", "id": "text-1", "x": 100.0, "y": 100.0, "content": "Hello"}),
            }]
        );
    }

    #[tokio::test]
    async fn optional_fields_absent_when_not_given() {
        let (ctx, sink) = testutil::ctx();
        AddNodeTool
            .execute(json!({"type": "image", "id": "image-1", "x": 400, "y": 100, "is_source": true}), &ctx)
            .await
            .unwrap();

        let CanvasEvent::Tool { args, .. } = &sink.events_for(&ctx.session_id)[0] else {
            panic!("expected tool event");
        };
        let obj = args.as_object().unwrap();
        assert!(!obj.contains_key("content"));
        assert!(!obj.contains_key("label"));
        assert_eq!(obj["is_source"], true);
    }

    #[tokio::test]
    async fn unknown_type_is_invalid() {
        let (ctx, sink) = testutil::ctx();
        let err = AddNodeTool
            .execute(json!({"type": "pdf", "id": "x", "x": 0, "y": 0}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn blank_id_is_invalid() {
        let (ctx, _sink) = testutil::ctx();
        let err = AddNodeTool
            .execute(json!({"type": "text", "id": "", "x": 0, "y": 0}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
