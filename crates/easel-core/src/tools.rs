use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::events::EventSink;
use crate::ids::SessionId;

/// Context available to tools during execution.
pub struct ToolContext {
    pub session_id: SessionId,
    pub sink: Arc<dyn EventSink>,
    pub abort_signal: CancellationToken,
}

/// Declaration sent to the model so it knows what it may call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// Trait implemented by each canvas tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;

    /// Read-only tools return their result to the model verbatim instead of
    /// wrapping it in a result marker.
    fn is_query(&self) -> bool {
        false
    }

    /// Execution limit for this tool. `None` uses the runner's default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters_schema: self.parameters_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn invalid(err: impl std::fmt::Display) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        let err = ToolError::InvalidArguments("missing field `id`".into());
        assert_eq!(err.to_string(), "invalid arguments: missing field `id`");

        let err = ToolError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn invalid_wraps_serde_errors() {
        let serde_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = ToolError::invalid(serde_err);
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("invalid type")));
    }
}
