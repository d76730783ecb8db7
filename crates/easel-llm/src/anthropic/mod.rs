//! Anthropic Messages API backend.

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
use decoder::AnthropicDecoder;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: ApiKey,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http::build_client()?,
            api_key,
            model: model.into(),
            endpoint: http::join_url(base_url.unwrap_or(DEFAULT_BASE_URL), MESSAGES_PATH),
        })
    }

    fn build_request(&self, context: &LlmContext, options: &StreamOptions) -> reqwest::RequestBuilder {
        let body = converter::build_request_body(context, options, &self.model);
        self.client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.0.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("accept", "text/event-stream")
            .json(&body)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(provider = "anthropic", model = %self.model))]
    async fn stream(
        &self,
        context: &LlmContext,
        options: &StreamOptions,
    ) -> Result<StreamEventStream, GatewayError> {
        debug!(messages = context.messages.len(), tools = context.tools.len(), "sending request");
        let resp = http::send(self.build_request(context, options)).await?;
        Ok(Box::pin(SseStream::new(resp.bytes_stream(), AnthropicDecoder::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::messages::Message;
    use easel_core::stream::StreamEvent;
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = "event: message_start\ndata: {\"type\":\"message_start\"}\n\n\
event: content_block_start\ndata: {\"index\":0,\"content_block\":{\"type\":\"text\"}}\n\n\
event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n\
event: content_block_stop\ndata: {\"index\":0}\n\n\
event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n\
event: message_stop\ndata: {}\n\n";

    #[test]
    fn provider_properties() {
        let provider = AnthropicProvider::new(ApiKey::new("k"), "claude-sonnet-4-5", None).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-sonnet-4-5");
        assert_eq!(provider.endpoint, "https://api.anthropic.com/v1/messages");
    }

    #[tokio::test]
    async fn streams_text_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(SSE_BODY),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new(ApiKey::new("test-key"), "m", Some(&server.uri())).unwrap();
        let context = LlmContext { messages: vec![Message::user_text("hi")], ..Default::default() };
        let stream = provider.stream(&context, &StreamOptions::default()).await.unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        match events.last() {
            Some(StreamEvent::Done { message, .. }) => assert_eq!(message.text_content(), "Hi"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_surfaces_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(ApiKey::new("k"), "m", Some(&server.uri())).unwrap();
        let result = provider.stream(&LlmContext::empty(), &StreamOptions::default()).await;
        assert!(matches!(result, Err(GatewayError::ProviderOverloaded)));
    }
}
