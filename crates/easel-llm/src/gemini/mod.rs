//! Google Gemini `streamGenerateContent` backend.

pub mod converter;
pub mod decoder;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use easel_core::context::LlmContext;
use easel_core::errors::GatewayError;
use easel_core::provider::{LlmProvider, StreamEventStream, StreamOptions};
use easel_core::security::ApiKey;

use crate::http;
use crate::sse::SseStream;
use decoder::GeminiDecoder;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: ApiKey,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http::build_client()?,
            api_key,
            model: model.into(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        })
    }

    fn endpoint(&self) -> String {
        http::join_url(
            &self.base_url,
            &format!("v1beta/models/{}:streamGenerateContent?alt=sse", self.model),
        )
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.model))]
    async fn stream(
        &self,
        context: &LlmContext,
        options: &StreamOptions,
    ) -> Result<StreamEventStream, GatewayError> {
        let body = converter::build_request_body(context, options);
        debug!(messages = context.messages.len(), tools = context.tools.len(), "sending request");
        let req = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.0.expose_secret())
            .json(&body);
        let resp = http::send(req).await?;
        Ok(Box::pin(SseStream::new(resp.bytes_stream(), GeminiDecoder::new())))
    }
}
