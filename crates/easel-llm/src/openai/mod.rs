//! OpenAI Chat Completions backend. Also serves OpenAI-compatible servers
//! through a custom base URL.

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
use decoder::OpenAiDecoder;

/// Includes the version segment; custom base URLs are expected to as well.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const COMPLETIONS_PATH: &str = "chat/completions";

pub struct OpenAiProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: ApiKey,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http::build_client()?,
            api_key,
            model: model.into(),
            endpoint: http::join_url(base_url.unwrap_or(DEFAULT_BASE_URL), COMPLETIONS_PATH),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(provider = "openai", model = %self.model))]
    async fn stream(
        &self,
        context: &LlmContext,
        options: &StreamOptions,
    ) -> Result<StreamEventStream, GatewayError> {
        let body = converter::build_request_body(context, options, &self.model);
        debug!(messages = context.messages.len(), tools = context.tools.len(), "sending request");
        let req = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.0.expose_secret())
            .json(&body);
        let resp = http::send(req).await?;
        Ok(Box::pin(SseStream::new(resp.bytes_stream(), OpenAiDecoder::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::stream::StreamEvent;
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn default_endpoint() {
        let provider = OpenAiProvider::new(ApiKey::new("k"), "gpt-4o", None).unwrap();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.name(), "openai");
    }

    #[tokio::test]
    async fn streams_tool_call_from_compatible_server() {
        let body = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"get_canvas_state\",\"arguments\":\"{}\"}}]}}]}\n\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n\
data: [DONE]\n\n";

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let base = format!("{}/v1", server.uri());
        let provider = OpenAiProvider::new(ApiKey::new("sk-test"), "local", Some(&base)).unwrap();
        let events: Vec<StreamEvent> = provider
            .stream(&LlmContext::empty(), &StreamOptions::default())
            .await
            .unwrap()
            .collect()
            .await;

        match events.last() {
            Some(StreamEvent::Done { message, .. }) => {
                assert_eq!(message.tool_calls()[0].name, "get_canvas_state");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
