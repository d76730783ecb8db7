use crate::messages::Message;
use crate::tools::ToolDefinition;

/// Everything a chat model sees for one request.
#[derive(Clone, Debug, Default)]
pub struct LlmContext {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

impl LlmContext {
    /// Create an empty context (useful for testing).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}
