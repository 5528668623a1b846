use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use vibe_core::{LlmConfig, Result, VibeError};

use crate::client::{LlmClient, TextStream};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic messages-API client.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: ANTHROPIC_API_BASE.to_string(),
            timeout_secs: 120,
        }
    }
}

/// Anthropic messages-API LLM gateway.
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(VibeError::Config(
                "Anthropic API key is required. Set ANTHROPIC_API_KEY environment variable."
                    .to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VibeError::Llm(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build a client from the environment-backed LLM settings.
    pub fn from_settings(llm: &LlmConfig) -> Result<Self> {
        let api_key = llm
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();
        Self::new(AnthropicConfig::new(api_key, llm.model.clone()))
    }

    fn request_body(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
        stream: bool,
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.config.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: system_prompt.map(str::to_string),
            max_tokens,
            temperature: Some(temperature),
            stream: if stream { Some(true) } else { None },
        }
    }

    async fn send(&self, body: &MessagesRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| VibeError::Llm(format!("failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VibeError::Llm(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        let body = self.request_body(prompt, system_prompt, max_tokens, temperature, false);
        let response = self.send(&body).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VibeError::Llm(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(VibeError::Llm("no content in response".to_string()));
        }

        Ok(text)
    }

    async fn invoke_streaming(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<TextStream> {
        let body = self.request_body(prompt, system_prompt, max_tokens, temperature, true);
        let response = self.send(&body).await?;

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| VibeError::Llm(format!("stream transport error: {}", e)))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let event: StreamEvent = match serde_json::from_str(payload) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!("Skipping unparsable stream event: {}", e);
                            continue;
                        }
                    };

                    match event.event_type.as_str() {
                        "content_block_delta" => {
                            if let Some(text) = event.delta.and_then(|d| d.text) {
                                yield text;
                            }
                        }
                        "message_stop" => return,
                        "error" => {
                            let message = event
                                .error
                                .map(|e| e.message)
                                .unwrap_or_else(|| "unknown stream error".to_string());
                            error!("Anthropic stream error: {}", message);
                            Err(VibeError::Llm(message))?;
                        }
                        _ => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn test_connection(&self) -> bool {
        self.invoke(
            "Respond with 'Connection successful' if you can read this.",
            None,
            32,
            0.1,
        )
        .await
        .is_ok()
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

// Anthropic API request/response types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_requires_api_key() {
        let config = AnthropicConfig::new(String::new(), "claude-3-5-sonnet-20241022".into());
        assert!(AnthropicClient::new(config).is_err());
    }

    #[test]
    fn request_body_omits_stream_flag_when_not_streaming() {
        let config = AnthropicConfig::new("key".into(), "model".into());
        let client = AnthropicClient::new(config).unwrap();

        let body = client.request_body("hello", Some("system"), 100, 0.3, false);
        let rendered = serde_json::to_value(&body).unwrap();
        assert!(rendered.get("stream").is_none());
        assert_eq!(rendered["system"], "system");
        assert_eq!(rendered["max_tokens"], 100);

        let body = client.request_body("hello", None, 100, 0.3, true);
        let rendered = serde_json::to_value(&body).unwrap();
        assert_eq!(rendered["stream"], true);
        assert!(rendered.get("system").is_none());
    }
}
