//! The canvas tool set.

pub mod add_node;
pub mod connect_nodes;
pub mod create_group;
pub mod delete_node;
pub mod get_canvas_state;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use easel_core::events::CanvasEvent;
use easel_core::tools::{ToolContext, ToolError};

use crate::registry::ToolRegistry;

pub use add_node::AddNodeTool;
pub use connect_nodes::ConnectNodesTool;
pub use create_group::CreateGroupTool;
pub use delete_node::DeleteNodeTool;
pub use get_canvas_state::GetCanvasStateTool;

/// Registry holding the five canvas tools. The state tool is per-session
/// because it owns that session's mailbox.
pub fn create_canvas_registry(get_state: GetCanvasStateTool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(get_state));

    // Mutations
    registry.register(Arc::new(AddNodeTool));
    registry.register(Arc::new(ConnectNodesTool));
    registry.register(Arc::new(CreateGroupTool));
    registry.register(Arc::new(DeleteNodeTool));

    registry
}

pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(ToolError::invalid)
}

pub(crate) fn require_id(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Tell the UI to apply a mutation, echoing the typed arguments.
pub(crate) fn emit_tool<A: Serialize>(ctx: &ToolContext, name: &str, args: &A) -> Result<(), ToolError> {
    let args = serde_json::to_value(args).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
    ctx.sink.emit(&ctx.session_id, CanvasEvent::Tool { name: name.to_string(), args });
    Ok(())
}
