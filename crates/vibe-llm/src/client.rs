use async_trait::async_trait;
use futures::stream::BoxStream;
use vibe_core::Result;

/// Incremental text fragments produced by a streaming invocation.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Gateway to a hosted large-language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke the model and return the full response text.
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String>;

    /// Invoke the model and yield incremental text chunks.
    async fn invoke_streaming(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<TextStream>;

    /// Cheap connectivity probe; never raises.
    async fn test_connection(&self) -> bool;

    /// Identifier of the configured model.
    fn model_id(&self) -> &str;
}
