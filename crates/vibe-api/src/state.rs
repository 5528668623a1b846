use std::sync::Arc;

use tokio::sync::RwLock;
use vibe_core::Settings;
use vibe_github::GitHubClient;
use vibe_graph::GraphClient;
use vibe_llm::{AnthropicClient, LlmClient};
use vibe_prompt::{EnhancementService, TemplateLoader};

use crate::reqlog::RequestLog;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<Settings>>,
    pub loader: Arc<TemplateLoader>,
    pub enhancement: Arc<EnhancementService>,
    pub llm: Arc<dyn LlmClient>,
    pub graph: Arc<GraphClient>,
    pub github: Arc<GitHubClient>,
    pub reqlog: Arc<RequestLog>,
}

impl AppState {
    pub fn new(settings: Settings) -> vibe_core::Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(AnthropicClient::from_settings(&settings.llm)?);
        Self::with_llm(settings, llm)
    }

    /// Assemble the state around an injected LLM gateway (used by tests and
    /// offline runs).
    pub fn with_llm(settings: Settings, llm: Arc<dyn LlmClient>) -> vibe_core::Result<Self> {
        let loader = Arc::new(TemplateLoader::new(&settings.prompt_catalog_path));
        let enhancement = Arc::new(EnhancementService::new(llm.clone(), loader.clone()));
        let graph = Arc::new(GraphClient::new(&settings.graph)?);
        let github = Arc::new(GitHubClient::new(&settings.github)?);
        let reqlog = Arc::new(RequestLog::new(settings.logs_dir.clone()));

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            loader,
            enhancement,
            llm,
            graph,
            github,
            reqlog,
        })
    }
}
