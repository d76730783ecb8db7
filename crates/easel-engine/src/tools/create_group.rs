use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use easel_core::tools::{Tool, ToolContext, ToolError};

use super::{emit_tool, parse_args, require_id};

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateGroupArgs {
    pub node_ids: Vec<String>,
    pub label: String,
}

pub struct CreateGroupTool;

#[async_trait]
impl Tool for CreateGroupTool {
    fn name(&self) -> &str {
        "create_group"
    }

    fn description(&self) -> &str {
        "Group existing nodes under a label"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["node_ids", "label"],
            "properties": {
                "node_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ids of the nodes to group"
                },
                "label": { "type": "string", "description": "Group title" }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: CreateGroupArgs = parse_args(args)?;
        if args.node_ids.is_empty() {
            return Err(ToolError::InvalidArguments("node_ids must not be empty".into()));
        }
        for id in &args.node_ids {
            require_id("node_ids", id)?;
        }

        emit_tool(ctx, self.name(), &args)?;
        Ok(format!("Created group {}", args.label))
    }
}
