use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use easel_core::tools::{Tool, ToolContext, ToolError};

use super::{emit_tool, parse_args, require_id};

#[derive(Debug, Deserialize, Serialize)]
pub struct DeleteNodeArgs {
    pub id: String,
}

pub struct DeleteNodeTool;

#[async_trait]
impl Tool for DeleteNodeTool {
    fn name(&self) -> &str {
        "delete_node"
    }

    fn description(&self) -> &str {
        "Remove a node and its edges from the canvas"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": { "type": "string", "description": "Id of the node to delete" }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: DeleteNodeArgs = parse_args(args)?;
        require_id("id", &args.id)?;

        emit_tool(ctx, self.name(), &args)?;
        Ok(format!("Node {} deleted", args.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil;
    use serde_json::json;

    #[tokio::test]
    async fn deletes() {
        let (ctx, sink) = testutil::ctx();
        let result = DeleteNodeTool.execute(json!({"id": "n1"}), &ctx).await.unwrap();
        assert_eq!(result, "Node n1 deleted");
        assert_eq!(sink.names(), ["tool"]);
    }

    #[tokio::test]
    async fn wrong_type_rejected() {
        let (ctx, sink) = testutil::ctx();
        assert!(DeleteNodeTool.execute(json!({"id": 7}), &ctx).await.is_err());
        assert!(sink.names().is_empty());
    }
}
