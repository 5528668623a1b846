use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use tracing::{error, warn};
use vibe_core::{
    ArchitectureInput, Complexity, ComplexityReport, EnhancementRequest, EnhancementResult,
    EnhancementType, Result, VibeError,
};
use vibe_llm::{LlmClient, RetryPolicy};

use crate::catalog::TemplateLoader;
use crate::constructor::PromptConstructor;

const DEFAULT_MAX_TOKENS: usize = 4000;
const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Drives the prompt constructor and the LLM gateway, normalizing every
/// outcome into an enhancement envelope.
pub struct EnhancementService {
    llm: Arc<dyn LlmClient>,
    constructor: PromptConstructor,
    loader: Arc<TemplateLoader>,
    retry: RetryPolicy,
}

impl EnhancementService {
    pub fn new(llm: Arc<dyn LlmClient>, loader: Arc<TemplateLoader>) -> Self {
        Self {
            llm,
            constructor: PromptConstructor::new(loader.clone()),
            loader,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn constructor(&self) -> &PromptConstructor {
        &self.constructor
    }

    /// Construct the prompt, invoke the LLM under the retry policy, and
    /// return a well-formed envelope whatever happens.
    pub async fn enhance(&self, request: &EnhancementRequest) -> EnhancementResult {
        let original_input = request.user_input.clone().unwrap_or_default();

        let constructed = match self.constructor.construct(request) {
            Ok(constructed) => constructed,
            Err(e) => {
                error!("Prompt construction failed: {}", e);
                return EnhancementResult::failure(original_input, e.to_string());
            }
        };

        let llm = Arc::clone(&self.llm);
        let user_prompt = constructed.user_prompt.clone();
        let system_prompt = constructed.system_prompt.clone();

        let outcome = self
            .retry
            .run(move || {
                let llm = Arc::clone(&llm);
                let user_prompt = user_prompt.clone();
                let system_prompt = system_prompt.clone();
                async move {
                    llm.invoke(
                        &user_prompt,
                        Some(&system_prompt),
                        DEFAULT_MAX_TOKENS,
                        DEFAULT_TEMPERATURE,
                    )
                    .await
                }
            })
            .await;

        match outcome {
            Ok(text) => EnhancementResult {
                success: true,
                enhanced_text: text.trim().to_string(),
                error: None,
                original_input,
                metadata: Some(constructed.metadata),
            },
            Err(e) => {
                error!("Enhancement failed: {}", e);
                EnhancementResult::failure(original_input, e.to_string())
            }
        }
    }

    /// Second LLM pass: turn an already-enhanced prompt into a detailed
    /// technical specification.
    pub async fn generate_specification(
        &self,
        enhanced_prompt: &str,
        requirements: &[String],
        file_context: &str,
    ) -> Result<String> {
        let mut sections = vec![
            "Produce a detailed technical specification for the following enhanced request."
                .to_string(),
            String::new(),
            "## ENHANCED REQUEST".to_string(),
            enhanced_prompt.to_string(),
        ];

        if !requirements.is_empty() {
            sections.push(String::new());
            sections.push("## NON-FUNCTIONAL REQUIREMENTS".to_string());
            for (i, req) in requirements.iter().enumerate() {
                sections.push(format!("{}. {}", i + 1, req));
            }
        }

        if !file_context.trim().is_empty() {
            sections.push(String::new());
            sections.push("## FILE CONTEXT".to_string());
            sections.push(file_context.to_string());
        }

        sections.push(String::new());
        sections.push(
            "Cover architecture, data model, API surface, testing strategy, and rollout considerations."
                .to_string(),
        );

        let prompt = sections.join("\n");
        let system_prompt = self.loader.system_prompt(EnhancementType::FullSpecification);

        let llm = Arc::clone(&self.llm);
        self.retry
            .run(move || {
                let llm = Arc::clone(&llm);
                let prompt = prompt.clone();
                let system_prompt = system_prompt.clone();
                async move {
                    llm.invoke(
                        &prompt,
                        Some(&system_prompt),
                        DEFAULT_MAX_TOKENS,
                        DEFAULT_TEMPERATURE,
                    )
                    .await
                }
            })
            .await
    }

    /// Ask the LLM to pick the 3-5 most relevant requirements for a prompt.
    /// Any failure falls back to the first three requirements.
    pub async fn select_relevant_requirements(
        &self,
        prompt: &str,
        all_requirements: &[String],
        task_type: &str,
    ) -> Vec<String> {
        if all_requirements.is_empty() {
            return Vec::new();
        }

        let listing: Vec<String> = all_requirements
            .iter()
            .enumerate()
            .map(|(i, req)| format!("{}. {}", i + 1, req))
            .collect();

        let selection_prompt = format!(
            "Given this user request: \"{}\"\n\nAnd these available non-functional requirements for {}:\n{}\n\nSelect the 3-5 most relevant requirements that apply to this specific request. Respond with only the numbers (e.g., \"1, 3, 5\") of the relevant requirements.",
            prompt,
            task_type,
            listing.join("\n")
        );

        match self.llm.invoke(&selection_prompt, None, 100, 0.1).await {
            Ok(response) => {
                let selected = parse_selected_indices(&response, all_requirements.len());
                if selected.is_empty() {
                    warn!("Requirement selection returned no usable indices, using first 3");
                    all_requirements.iter().take(3).cloned().collect()
                } else {
                    selected
                        .into_iter()
                        .map(|i| all_requirements[i].clone())
                        .collect()
                }
            }
            Err(e) => {
                warn!("Failed to extract relevant requirements: {}", e);
                all_requirements.iter().take(3).cloned().collect()
            }
        }
    }

    /// Heuristic complexity estimate over the input text and optional
    /// architecture. Never raises; internal faults degrade to `unknown`.
    pub fn analyze_complexity(
        &self,
        text: &str,
        architecture: Option<&ArchitectureInput>,
    ) -> ComplexityReport {
        match self.try_analyze_complexity(text, architecture) {
            Ok(report) => report,
            Err(e) => {
                error!("Error analyzing prompt complexity: {}", e);
                ComplexityReport::unknown(e.to_string())
            }
        }
    }

    fn try_analyze_complexity(
        &self,
        text: &str,
        architecture: Option<&ArchitectureInput>,
    ) -> Result<ComplexityReport> {
        let medium_threshold = rule_as_usize(self.loader.validation_rule("complexity_medium_words", 150))?;
        let high_threshold = rule_as_usize(self.loader.validation_rule("complexity_high_words", 300))?;
        let max_total_components =
            rule_as_usize(self.loader.validation_rule("max_total_components", 50))?;

        let word_count = text.split_whitespace().count();
        let file_references = self.extract_file_references(text);

        let estimated_complexity = if word_count > high_threshold {
            Complexity::High
        } else if word_count > medium_threshold {
            Complexity::Medium
        } else {
            Complexity::Low
        };

        let mut recommendations = Vec::new();
        if estimated_complexity == Complexity::High {
            recommendations
                .push("Consider breaking down into smaller, focused prompts".to_string());
        }
        let lowered = text.to_lowercase();
        if lowered.contains("test") || lowered.contains("debug") {
            recommendations
                .push("Consider including specific error messages or test cases".to_string());
        }
        if lowered.contains("refactor") {
            recommendations.push("Consider specifying the current issues with the code".to_string());
        }
        if let Some(architecture) = architecture {
            let total_components: usize = architecture
                .parsed_layers()
                .iter()
                .map(|layer| layer.node_count)
                .sum();
            if total_components > max_total_components {
                recommendations.push(format!(
                    "Architecture context lists {} components; consider narrowing to the affected layers",
                    total_components
                ));
            }
        }

        Ok(ComplexityReport {
            length: text.len(),
            word_count,
            has_file_references: !file_references.is_empty(),
            estimated_complexity,
            recommendations,
            error: None,
        })
    }

    /// Extract candidate file references using the configured pattern list.
    /// Invalid patterns are skipped with a warning.
    pub fn extract_file_references(&self, text: &str) -> BTreeSet<String> {
        let mut references = BTreeSet::new();

        for pattern in self.loader.file_patterns() {
            let regex = match Regex::new(&pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!("Skipping invalid file pattern '{}': {}", pattern, e);
                    continue;
                }
            };
            for captures in regex.captures_iter(text) {
                let matched = captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|m| m.as_str().to_string());
                if let Some(matched) = matched {
                    references.insert(matched);
                }
            }
        }

        references
    }

    /// Quick textual suggestions for improving a prompt.
    pub fn suggest_improvements(&self, prompt: &str) -> Vec<String> {
        let mut suggestions = Vec::new();
        let lowered = prompt.to_lowercase();

        if prompt.len() < 20 {
            suggestions.push(
                "Prompt seems very short. Consider adding more detail about what you want to achieve."
                    .to_string(),
            );
        }

        let action_verbs = [
            "please", "help", "create", "build", "implement", "fix", "refactor", "test",
        ];
        if !action_verbs.iter().any(|verb| lowered.contains(verb)) {
            suggestions.push(
                "Consider adding a clear action verb (create, build, implement, fix, etc.)"
                    .to_string(),
            );
        }

        if lowered.contains("error") && !lowered.contains("message") {
            suggestions.push(
                "When mentioning errors, consider including the actual error message.".to_string(),
            );
        }

        if prompt.split('.').count() < 2 {
            suggestions.push(
                "Consider breaking your request into multiple sentences for clarity.".to_string(),
            );
        }

        suggestions
    }
}

fn rule_as_usize(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| VibeError::Config(format!("validation rule must be non-negative, got {}", value)))
}

/// Parse 1-based indices out of an LLM selection response, bound-checked
/// and deduplicated, preserving response order.
fn parse_selected_indices(response: &str, limit: usize) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut indices = Vec::new();

    for raw in response
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
    {
        if let Ok(number) = raw.parse::<usize>() {
            if number >= 1 && number <= limit && seen.insert(number) {
                indices.push(number - 1);
            }
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use vibe_llm::{ScriptedLlm, ScriptedReply};

    fn service(llm: ScriptedLlm) -> (EnhancementService, Arc<ScriptedLlm>) {
        let llm = Arc::new(llm);
        let loader = Arc::new(TemplateLoader::new(Path::new("missing/prompt_config.json")));
        (
            EnhancementService::new(llm.clone() as Arc<dyn LlmClient>, loader),
            llm,
        )
    }

    fn request(input: &str) -> EnhancementRequest {
        EnhancementRequest {
            user_input: Some(input.to_string()),
            enhancement_type: "enhanced_prompt".to_string(),
            ..EnhancementRequest::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_responses_are_retried_until_a_valid_one() {
        let (service, llm) = service(ScriptedLlm::scripted(vec![
            ScriptedReply::Text(String::new()),
            ScriptedReply::Text(String::new()),
            ScriptedReply::Text("enhanced output".to_string()),
        ]));

        let result = service.enhance(&request("add a search box")).await;
        assert!(result.success);
        assert_eq!(result.enhanced_text, "enhanced output");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_empty_responses_exhaust_into_failure_envelope() {
        let (service, llm) = service(ScriptedLlm::fixed(""));

        let result = service.enhance(&request("add a search box")).await;
        assert!(!result.success);
        assert_eq!(llm.call_count(), 3);
        let error = result.error.unwrap();
        assert!(error.contains("3 attempts"));
        assert!(result.enhanced_text.starts_with("Enhancement failed:"));
        assert_eq!(result.original_input, "add a search box");
    }

    #[tokio::test]
    async fn construction_failure_yields_failure_envelope_without_invoking() {
        let (service, llm) = service(ScriptedLlm::fixed("never used"));

        let result = service.enhance(&EnhancementRequest::default()).await;
        assert!(!result.success);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn envelope_echoes_metadata_on_success() {
        let (service, _) = service(ScriptedLlm::fixed("done"));

        let mut req = request("implement checkout");
        req.requirements = vec!["must be fast".to_string()];
        let result = service.enhance(&req).await;

        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.requirement_count, 1);
        assert_eq!(metadata.enhancement_type, "enhanced_prompt");
    }

    #[tokio::test]
    async fn requirement_selection_parses_indices() {
        let (service, _) = service(ScriptedLlm::fixed("I would pick 1, 3 and 9"));
        let all = vec![
            "first".to_string(),
            "second".to_string(),
            "third".to_string(),
        ];

        let picked = service
            .select_relevant_requirements("prompt", &all, "development")
            .await;
        // 9 is out of bounds and dropped.
        assert_eq!(picked, vec!["first".to_string(), "third".to_string()]);
    }

    #[tokio::test]
    async fn requirement_selection_falls_back_to_first_three() {
        let (service, _) = service(ScriptedLlm::scripted(vec![ScriptedReply::Error(
            "down".to_string(),
        )]));
        let all: Vec<String> = (1..=5).map(|i| format!("req {}", i)).collect();

        let picked = service
            .select_relevant_requirements("prompt", &all, "development")
            .await;
        assert_eq!(picked, vec!["req 1", "req 2", "req 3"]);
    }

    #[test]
    fn complexity_buckets_follow_thresholds() {
        let (service, _) = service(ScriptedLlm::fixed("unused"));

        let low = service.analyze_complexity("short prompt", None);
        assert_eq!(low.estimated_complexity, Complexity::Low);

        let medium_text = "word ".repeat(200);
        let medium = service.analyze_complexity(&medium_text, None);
        assert_eq!(medium.estimated_complexity, Complexity::Medium);

        let high_text = "word ".repeat(400);
        let high = service.analyze_complexity(&high_text, None);
        assert_eq!(high.estimated_complexity, Complexity::High);
        assert!(high
            .recommendations
            .iter()
            .any(|r| r.contains("breaking down")));
    }

    #[test]
    fn file_references_are_deduplicated() {
        let (service, _) = service(ScriptedLlm::fixed("unused"));
        let refs =
            service.extract_file_references("fix `app.py` and app.py plus src/main.rs please");

        assert!(refs.contains("app.py"));
        assert!(refs.contains("src/main.rs"));
        // Dedup: `app.py` appears once despite matching multiple patterns.
        assert_eq!(refs.iter().filter(|r| r.as_str() == "app.py").count(), 1);
    }

    #[test]
    fn suggestions_flag_short_and_verbless_prompts() {
        let (service, _) = service(ScriptedLlm::fixed("unused"));

        let suggestions = service.suggest_improvements("the thing");
        assert!(suggestions.iter().any(|s| s.contains("very short")));
        assert!(suggestions.iter().any(|s| s.contains("action verb")));

        let fine = service.suggest_improvements(
            "Please implement a pagination component. It should follow the existing design system.",
        );
        assert!(fine.is_empty());
    }

    #[test]
    fn selection_index_parsing_is_bounded_and_deduplicated() {
        assert_eq!(parse_selected_indices("1, 3, 3, 12", 5), vec![0, 2]);
        assert_eq!(parse_selected_indices("none apply", 5), Vec::<usize>::new());
    }
}
