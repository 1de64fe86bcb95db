// Language model seam and the hosted chat completion adapter

pub mod anthropic;

use async_trait::async_trait;

use crate::http::ProviderError;

pub use anthropic::AnthropicClient;

/// Single-turn text completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}
