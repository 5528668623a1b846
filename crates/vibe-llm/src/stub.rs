use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use vibe_core::{Result, VibeError};

use crate::client::{LlmClient, TextStream};

/// One scripted reply from the stubbed gateway.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(String),
}

/// Deterministic in-process LLM double for tests and offline development.
///
/// Replies are served from a script in order; once the script is exhausted
/// the fallback reply (if any) repeats forever.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<String>,
    connected: bool,
    calls: AtomicUsize,
    model: String,
}

impl ScriptedLlm {
    pub fn scripted(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            connected: true,
            calls: AtomicUsize::new(0),
            model: "scripted-llm".to_string(),
        }
    }

    /// A stub that always returns the same text.
    pub fn fixed(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(text.to_string()),
            connected: true,
            calls: AtomicUsize::new(0),
            model: "scripted-llm".to_string(),
        }
    }

    /// A stub whose connectivity probe fails.
    pub fn disconnected() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            connected: false,
            calls: AtomicUsize::new(0),
            model: "scripted-llm".to_string(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(message)) => Err(VibeError::Llm(message)),
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(VibeError::Llm("scripted replies exhausted".to_string())),
            },
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: usize,
        _temperature: f32,
    ) -> Result<String> {
        self.next_reply()
    }

    async fn invoke_streaming(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<TextStream> {
        let text = self
            .invoke(prompt, system_prompt, max_tokens, temperature)
            .await?;

        // Split into word-ish chunks so consumers see more than one event.
        let chunks: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn test_connection(&self) -> bool {
        self.connected
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
