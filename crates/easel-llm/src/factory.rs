use std::sync::Arc;

use tracing::debug;

use easel_core::errors::GatewayError;
use easel_core::provider::LlmProvider;
use easel_core::security::{ProviderConfig, ProviderKind};

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;

/// Build a chat-model client for the configured backend and model.
pub fn create_provider(
    config: &ProviderConfig,
    model: &str,
) -> Result<Arc<dyn LlmProvider>, GatewayError> {
    let kind: ProviderKind = config.kind.parse()?;

    let model = model.trim();
    if model.is_empty() {
        return Err(GatewayError::Configuration(format!("no model given for {kind} provider")));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_blank())
        .ok_or_else(|| GatewayError::Configuration(format!("missing API key for {kind} provider")))?;
    let base_url = config.base_url.as_deref().filter(|u| !u.trim().is_empty());

    debug!(%kind, model, custom_base_url = base_url.is_some(), "creating provider");

    Ok(match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, model, base_url)?),
        ProviderKind::OpenAI => Arc::new(OpenAiProvider::new(api_key, model, base_url)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, model, base_url)?),
    })
}
