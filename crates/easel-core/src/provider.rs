use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::context::LlmContext;
use crate::errors::GatewayError;
use crate::stream::StreamEvent;

pub type StreamEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Options controlling generation.
#[derive(Clone, Debug, Default)]
pub struct StreamOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// The chat-model capability the agent runner depends on.
/// Implemented once per backend; the runner never branches on which one it holds.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn stream(
        &self,
        context: &LlmContext,
        options: &StreamOptions,
    ) -> Result<StreamEventStream, GatewayError>;
}
