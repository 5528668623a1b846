pub mod anthropic;
pub mod client;
pub mod retry;
pub mod stub;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, TextStream};
pub use retry::RetryPolicy;
pub use stub::{ScriptedLlm, ScriptedReply};
