use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use easel_core::tools::{Tool, ToolContext, ToolError};

use super::{emit_tool, parse_args, require_id};

#[derive(Debug, Deserialize, Serialize)]
pub struct ConnectNodesArgs {
    pub source: String,
    pub target: String,
}

pub struct ConnectNodesTool;

#[async_trait]
impl Tool for ConnectNodesTool {
    fn name(&self) -> &str {
        "connect_nodes"
    }

    fn description(&self) -> &str {
        "Draw an edge from a source node to a target node"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["source", "target"],
            "properties": {
                "source": { "type": "string", "description": "Id of the upstream node" },
                "target": { "type": "string", "description": "Id of the downstream node" }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: ConnectNodesArgs = parse_args(args)?;
        require_id("source", &args.source)?;
        require_id("target", &args.target)?;

        emit_tool(ctx, self.name(), &args)?;
        Ok(format!("Connected {} to {}", args.source, args.target))
    }
}
