//! Streaming chat-model clients behind [`easel_core::provider::LlmProvider`].

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
pub mod sse;

pub mod mock;

pub use anthropic::AnthropicProvider;
pub use factory::create_provider;
pub use gemini::GeminiProvider;
pub use mock::{MockProvider, MockResponse};
pub use openai::OpenAiProvider;
